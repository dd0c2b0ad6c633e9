/// Normalizes a free-text place name into a location key
///
/// Two place strings that differ only in case, spacing, comma spacing or
/// trailing punctuation produce the same key, so the key can be used to
/// share one geocode result between them.
///
/// # Normalization Steps
///
/// 1. Lowercase and trim
/// 2. Collapse whitespace runs to one space
/// 3. Standardize comma spacing to `", "`
/// 4. Strip trailing `.`, `,`, `;` and any whitespace that exposes
///
/// The result is idempotent: normalizing a key returns the same key.
///
/// # Returns
///
/// * `Some(String)` - The normalized key
/// * `None` - The input was absent, empty or reduced to nothing
///
/// # Examples
///
/// ```
/// use funk_tree_crawler::normalize_location_key;
///
/// assert_eq!(
///     normalize_location_key(Some("  Lancaster,  Pennsylvania, USA  ")).as_deref(),
///     Some("lancaster, pennsylvania, usa")
/// );
/// assert_eq!(normalize_location_key(Some("   ")), None);
/// ```
pub fn normalize_location_key(raw: Option<&str>) -> Option<String> {
    let raw = raw?;

    let lowered = raw.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let comma_spaced = collapsed
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ");

    let key = comma_spaced
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';') || c.is_whitespace())
        .trim_start();

    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
