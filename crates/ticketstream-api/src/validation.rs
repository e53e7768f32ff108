//! Header and field validation helpers for bulk submissions.

use std::collections::HashMap;

/// Columns that must be present after normalization.
pub const REQUIRED_COLUMNS: &[&str] = &["ticketnumber", "title", "customerid"];

/// Optional columns recognized by the parser.
pub const OPTIONAL_COLUMNS: &[&str] = &["description", "status", "priority", "assignedto"];

/// Accepted upload file extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".csv", ".txt"];

/// Normalize a header name: lowercase, spaces and underscores stripped.
///
/// `Ticket_Number`, `ticket number`, and `ticketnumber` all address the
/// same column.
#[must_use]
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace([' ', '_'], "")
}

/// Map normalized header names to their 0-based column indices.
#[must_use]
pub fn column_index(headers: &csv::StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            let normalized = normalize_header(name);
            (!normalized.is_empty()).then_some((normalized, idx))
        })
        .collect()
}

/// Names of required columns absent from the index, in contract order.
#[must_use]
pub fn missing_required(columns: &HashMap<String, usize>) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.contains_key(**required))
        .map(|s| (*s).to_string())
        .collect()
}

/// Whether the filename carries an accepted extension.
#[must_use]
pub fn has_allowed_extension(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Fetch a trimmed, non-empty cell by normalized column name.
#[must_use]
pub fn cell<'a>(
    row: &'a csv::StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    columns
        .get(name)
        .and_then(|&idx| row.get(idx))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
