use std::collections::HashSet;

use crate::record::{DuplicateStatus, ListingRecord, TaggedRecord};

/// Mark each record `Duplicate` if its ID is in `known_ids`, else `New`.
///
/// Matching is exact string equality. Records in the same batch are not
/// compared with each other, only with the snapshot.
pub fn tag(records: Vec<ListingRecord>, known_ids: &[String]) -> Vec<TaggedRecord> {
    let known: HashSet<&str> = known_ids.iter().map(String::as_str).collect();
    records
        .into_iter()
        .map(|record| {
            let status = if known.contains(record.external_id.as_str()) {
                DuplicateStatus::Duplicate
            } else {
                DuplicateStatus::New
            };
            TaggedRecord { record, status }
        })
        .collect()
}
