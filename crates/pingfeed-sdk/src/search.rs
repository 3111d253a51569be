//! Title search

use crate::traits::Titled;

/// Records whose title contains `query`, ignoring case, in input order
///
/// An empty query keeps every record.
pub fn filter_by_title<T: Titled + Clone>(records: &[T], query: &str) -> Vec<T> {
    if query.is_empty() {
        return records.to_vec();
    }

    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| r.title().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
