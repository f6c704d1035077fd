//! Textual reference helpers shared by the resolver and the query filters.

/// Whether a reference carries the exclusion prefix `!`.
///
/// Negated references are honoured by query filters only; mutations treat
/// them as plain (unresolvable) names.
pub fn is_negated(reference: &str) -> bool {
    reference.starts_with('!')
}

/// Strip the exclusion prefix, if present.
pub fn remove_negation(reference: &str) -> &str {
    reference.strip_prefix('!').unwrap_or(reference)
}

/// Split a comma-separated reference list, dropping empty items.
pub fn split_reference_list(references: &str) -> Vec<String> {
    references
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
