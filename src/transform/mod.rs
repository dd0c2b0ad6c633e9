//! Profile transformation
//!
//! Pure functions that turn sparse WikiTree profiles into person records and
//! queueable relatives.

mod location;
mod relatives;

use crate::api::Profile;
use crate::storage::PersonRecord;

pub use location::normalize_location_key;
pub use relatives::{
    extract_relative_ids, relatives_of, Relative, RelativeKind, CHILD_PRIORITY, PARENT_PRIORITY,
    SPOUSE_PRIORITY,
};

/// Returns the trimmed value if present and not blank
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Builds a display name for a profile
///
/// # Fallback Chain
///
/// 1. `LongName` when present and not blank
/// 2. First, middle, last name at birth (else current last name) and suffix,
///    skipping missing parts
/// 3. The WikiTree id
/// 4. `"Unknown"`
pub fn build_full_name(profile: &Profile) -> String {
    if let Some(long_name) = non_blank(&profile.long_name) {
        return long_name.to_string();
    }

    let last_name = non_blank(&profile.last_name_at_birth)
        .or_else(|| non_blank(&profile.last_name_current));

    let parts: Vec<&str> = [
        non_blank(&profile.first_name),
        non_blank(&profile.middle_name),
        last_name,
        non_blank(&profile.suffix),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !parts.is_empty() {
        return parts.join(" ");
    }

    non_blank(&profile.name).unwrap_or("Unknown").to_string()
}

/// Returns false for ids WikiTree uses to mean "nobody"
///
/// Absent, empty, whitespace-only, and `0` are all invalid.
pub fn is_valid_id(id: Option<&str>) -> bool {
    match id.map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(_) => true,
    }
}

/// Drops WikiTree's unknown-date sentinels
///
/// Dates are opaque text; anything starting with `0000` carries no year and
/// is treated as absent.
pub fn normalize_date(date: Option<&str>) -> Option<String> {
    let date = date?.trim();
    if date.is_empty() || date.starts_with("0000") {
        None
    } else {
        Some(date.to_string())
    }
}

/// Converts a profile into a person record
///
/// Returns None when the profile has no valid WikiTree id.
pub fn profile_to_person(profile: &Profile) -> Option<PersonRecord> {
    let wiki_id = non_blank(&profile.name)
        .filter(|id| is_valid_id(Some(*id)))?
        .to_string();

    let valid_parent = |id: &Option<String>| {
        id.as_deref()
            .filter(|id| is_valid_id(Some(*id)))
            .map(|id| id.trim().to_string())
    };

    Some(PersonRecord {
        name: build_full_name(profile),
        wiki_numeric_id: profile.id,
        first_name: profile.first_name.clone(),
        middle_name: profile.middle_name.clone(),
        last_name_birth: profile.last_name_at_birth.clone(),
        last_name_current: profile.last_name_current.clone(),
        suffix: profile.suffix.clone(),
        gender: profile.gender.clone(),
        birth_date: normalize_date(profile.birth_date.as_deref()),
        death_date: normalize_date(profile.death_date.as_deref()),
        birth_location: profile.birth_location.clone(),
        birth_location_key: normalize_location_key(profile.birth_location.as_deref()),
        death_location: profile.death_location.clone(),
        death_location_key: normalize_location_key(profile.death_location.as_deref()),
        is_living: profile.is_living == Some(1),
        generation: None,
        father_wiki_id: valid_parent(&profile.father),
        mother_wiki_id: valid_parent(&profile.mother),
        wiki_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            name: Some("Funck-6".to_string()),
            ..Profile::default()
        }
    }

    #[test]
    fn test_full_name_from_parts() {
        let p = Profile {
            first_name: Some("Anna".to_string()),
            last_name_at_birth: Some("Funck".to_string()),
            ..profile()
        };
        assert_eq!(build_full_name(&p), "Anna Funck");

        let p = Profile {
            first_name: Some("Johann".to_string()),
            middle_name: Some("Georg".to_string()),
            last_name_current: Some("Funk".to_string()),
            suffix: Some("Jr.".to_string()),
            ..profile()
        };
        assert_eq!(build_full_name(&p), "Johann Georg Funk Jr.");
    }

    #[test]
    fn test_full_name_prefers_birth_surname() {
        let p = Profile {
            first_name: Some("Anna".to_string()),
            last_name_at_birth: Some("Funck".to_string()),
            last_name_current: Some("Meyer".to_string()),
            ..profile()
        };
        assert_eq!(build_full_name(&p), "Anna Funck");
    }

    #[test]
    fn test_full_name_prefers_long_name() {
        let p = Profile {
            long_name: Some("Bishop Henry Funck".to_string()),
            first_name: Some("Heinrich".to_string()),
            ..profile()
        };
        assert_eq!(build_full_name(&p), "Bishop Henry Funck");

        let p = Profile {
            long_name: Some("   ".to_string()),
            first_name: Some("Heinrich".to_string()),
            ..profile()
        };
        assert_eq!(build_full_name(&p), "Heinrich");
    }

    #[test]
    fn test_full_name_fallbacks() {
        assert_eq!(build_full_name(&profile()), "Funck-6");
        assert_eq!(build_full_name(&Profile::default()), "Unknown");

        let blank = Profile {
            first_name: Some("".to_string()),
            ..Profile::default()
        };
        assert_eq!(build_full_name(&blank), "Unknown");
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id(Some("Funck-6")));
        assert!(is_valid_id(Some("12345")));
        assert!(!is_valid_id(None));
        assert!(!is_valid_id(Some("")));
        assert!(!is_valid_id(Some("   ")));
        assert!(!is_valid_id(Some("0")));
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date(Some("1690-00-00")).as_deref(), Some("1690-00-00"));
        assert_eq!(normalize_date(Some("1760")).as_deref(), Some("1760"));
        assert_eq!(normalize_date(Some("0000-00-00")), None);
        assert_eq!(normalize_date(Some("0000")), None);
        assert_eq!(normalize_date(Some("")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn test_profile_to_person() {
        let p = Profile {
            id: Some(1234),
            first_name: Some("Heinrich".to_string()),
            last_name_at_birth: Some("Funck".to_string()),
            birth_date: Some("1690-00-00".to_string()),
            death_date: Some("0000-00-00".to_string()),
            birth_location: Some("Palatinate,  Germany.".to_string()),
            is_living: Some(0),
            father: Some("0".to_string()),
            mother: Some("Meyer-3".to_string()),
            ..profile()
        };

        let person = profile_to_person(&p).unwrap();
        assert_eq!(person.wiki_id, "Funck-6");
        assert_eq!(person.wiki_numeric_id, Some(1234));
        assert_eq!(person.name, "Heinrich Funck");
        assert_eq!(person.birth_date.as_deref(), Some("1690-00-00"));
        assert_eq!(person.death_date, None);
        assert_eq!(person.birth_location.as_deref(), Some("Palatinate,  Germany."));
        assert_eq!(
            person.birth_location_key.as_deref(),
            Some("palatinate, germany")
        );
        assert_eq!(person.death_location_key, None);
        assert!(!person.is_living);
        assert_eq!(person.father_wiki_id, None);
        assert_eq!(person.mother_wiki_id.as_deref(), Some("Meyer-3"));
    }

    #[test]
    fn test_profile_without_id_is_skipped() {
        let p = Profile {
            first_name: Some("Anna".to_string()),
            ..Profile::default()
        };
        assert!(profile_to_person(&p).is_none());

        let blank = Profile {
            name: Some("  ".to_string()),
            ..Profile::default()
        };
        assert!(profile_to_person(&blank).is_none());

        let nobody = Profile {
            name: Some("0".to_string()),
            first_name: Some("Anna".to_string()),
            ..Profile::default()
        };
        assert!(profile_to_person(&nobody).is_none());
    }

    #[test]
    fn test_living_flag() {
        let p = Profile {
            is_living: Some(1),
            ..profile()
        };
        assert!(profile_to_person(&p).unwrap().is_living);
    }
}
