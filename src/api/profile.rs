//! WikiTree profile shape and lenient response decoding
//!
//! The API returns sparse, loosely typed JSON: any field may be missing or
//! null, numeric ids sometimes arrive as strings, and relative lists are
//! either a map keyed by id or an array of objects. Everything here decodes
//! leniently; only a structurally wrong payload is an error.

use crate::ApiError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Fields requested by `getProfile`
pub const PROFILE_FIELDS: &str = "Id,Name,LongName,FirstName,MiddleName,LastNameAtBirth,\
LastNameCurrent,Suffix,BirthDate,DeathDate,BirthLocation,DeathLocation,Gender,Father,Mother,\
Spouses,Children,Parents,BirthDateDecade,DeathDateDecade,IsLiving";

/// Fields requested by `getAncestors`
pub const ANCESTOR_FIELDS: &str =
    "Id,Name,FirstName,LastNameAtBirth,BirthDate,DeathDate,BirthLocation,Gender,Father,Mother";

/// Fields requested by `getDescendants`
pub const DESCENDANT_FIELDS: &str = "Id,Name,FirstName,LastNameAtBirth,BirthDate,DeathDate,\
BirthLocation,Gender,Father,Mother,Children";

/// One person as returned by the WikiTree API
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub id: Option<i64>,

    /// The WikiTree id, e.g. `Funck-6`
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    /// Preformatted display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub long_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub middle_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name_at_birth: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name_current: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub suffix: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub birth_date: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub death_date: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub birth_location: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub death_location: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub birth_date_decade: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub death_date_decade: Option<String>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub is_living: Option<i64>,

    /// Father's id; WikiTree sends a number, `0` when unknown
    #[serde(default, deserialize_with = "lenient_string")]
    pub father: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub mother: Option<String>,

    /// Raw relative lists, either `{id: {...}}` or `[{Name: id, ...}]`
    #[serde(default)]
    pub spouses: Option<Value>,

    #[serde(default)]
    pub children: Option<Value>,

    #[serde(default)]
    pub parents: Option<Value>,
}

impl Profile {
    /// Builds a profile from one JSON object
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        if !value.is_object() {
            return Err(ApiError::InvalidResponse(format!(
                "expected a profile object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Decodes a `getProfile` response body
///
/// A missing, null or empty `profile` entry means the id does not exist.
pub fn decode_profile_response(wiki_id: &str, body: Value) -> Result<Profile, ApiError> {
    let first = first_result(body)?;

    let not_found = || ApiError::NotFound {
        wiki_id: wiki_id.to_string(),
    };

    let Some(mut item) = first else {
        return Err(not_found());
    };

    match item.get_mut("profile").map(Value::take) {
        None | Some(Value::Null) => Err(not_found()),
        Some(Value::Array(items)) if items.is_empty() => Err(not_found()),
        Some(Value::Object(map)) if map.is_empty() => Err(not_found()),
        Some(profile) => Profile::from_value(profile),
    }
}

/// Decodes a `getDescendants` or `getAncestors` response body
///
/// `list_key` is `descendants` or `ancestors`. A missing list is empty.
pub fn decode_profile_list_response(list_key: &str, body: Value) -> Result<Vec<Profile>, ApiError> {
    let Some(mut item) = first_result(body)? else {
        return Ok(Vec::new());
    };

    match item.get_mut(list_key).map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.into_iter().map(Profile::from_value).collect(),
        Some(other) => Err(ApiError::InvalidResponse(format!(
            "expected {} to be an array, got {}",
            list_key,
            json_kind(&other)
        ))),
    }
}

/// Every WikiTree response is an array with one result object per key
fn first_result(body: Value) -> Result<Option<Value>, ApiError> {
    match body {
        Value::Array(items) => Ok(items.into_iter().next()),
        other => Err(ApiError::InvalidResponse(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(i64::from(b)),
        _ => None,
    })
}
