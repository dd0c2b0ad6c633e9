use crate::api::Profile;
use crate::transform::is_valid_id;
use serde_json::Value;

/// Queue priority for parents (only when parent crawling is enabled)
pub const PARENT_PRIORITY: i64 = 2;

/// Queue priority for spouses
pub const SPOUSE_PRIORITY: i64 = 1;

/// Queue priority for children
pub const CHILD_PRIORITY: i64 = 0;

/// How a relative is connected to the profile it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeKind {
    Parent,
    Spouse,
    Child,
}

impl RelativeKind {
    pub fn priority(&self) -> i64 {
        match self {
            Self::Parent => PARENT_PRIORITY,
            Self::Spouse => SPOUSE_PRIORITY,
            Self::Child => CHILD_PRIORITY,
        }
    }
}

/// A relative worth queueing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relative {
    pub wiki_id: String,
    pub kind: RelativeKind,
    pub priority: i64,
}

/// Extracts WikiTree ids from a relative list
///
/// WikiTree returns relatives either as an object keyed by id or as an
/// array of profile objects. For arrays the `Name` field is used, falling
/// back to `Id`; elements that are not objects are dropped. Any other shape
/// yields nothing.
pub fn extract_relative_ids(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let object = item.as_object()?;
                object
                    .get("Name")
                    .and_then(scalar_to_string)
                    .or_else(|| object.get("Id").and_then(scalar_to_string))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lists the relatives of a profile that should be queued
///
/// Spouses and children are always included; parents only when
/// `include_parents` is set. Invalid ids are removed, and an id reachable
/// through several relationships appears once with the highest priority.
/// Order follows first discovery.
pub fn relatives_of(profile: &Profile, include_parents: bool) -> Vec<Relative> {
    let mut relatives: Vec<Relative> = Vec::new();

    let mut push = |wiki_id: String, kind: RelativeKind| {
        if !is_valid_id(Some(wiki_id.as_str())) {
            return;
        }
        let wiki_id = wiki_id.trim().to_string();
        let priority = kind.priority();

        match relatives.iter_mut().find(|r| r.wiki_id == wiki_id) {
            Some(existing) if existing.priority < priority => {
                existing.priority = priority;
                existing.kind = kind;
            }
            Some(_) => {}
            None => relatives.push(Relative {
                wiki_id,
                kind,
                priority,
            }),
        }
    };

    for id in extract_relative_ids(profile.spouses.as_ref()) {
        push(id, RelativeKind::Spouse);
    }

    for id in extract_relative_ids(profile.children.as_ref()) {
        push(id, RelativeKind::Child);
    }

    if include_parents {
        for id in [&profile.father, &profile.mother].into_iter().flatten() {
            push(id.clone(), RelativeKind::Parent);
        }
        for id in extract_relative_ids(profile.parents.as_ref()) {
            push(id, RelativeKind::Parent);
        }
    }

    relatives
}
