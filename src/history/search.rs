//! Case-insensitive history filtering.

use crate::models::BarcodeEntry;

/// Entries whose display name, value or symbology contains `query`, in
/// collection order. A blank query matches everything; any other query is
/// matched as given, surrounding whitespace included.
pub fn filter<'a>(entries: &'a [BarcodeEntry], query: &str) -> Vec<&'a BarcodeEntry> {
    if query.trim().is_empty() {
        return entries.iter().collect();
    }
    let needle = query.to_lowercase();

    entries
        .iter()
        .filter(|entry| matches(entry, &needle))
        .collect()
}

/// `needle` must already be lowercase.
fn matches(entry: &BarcodeEntry, needle: &str) -> bool {
    entry
        .display_name()
        .is_some_and(|name| name.to_lowercase().contains(needle))
        || entry.value().to_lowercase().contains(needle)
        || entry.symbology().as_str().to_lowercase().contains(needle)
}
