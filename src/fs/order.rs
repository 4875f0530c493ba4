use std::cmp::Ordering;

use crate::preferences::{SortBy, SortOrder};

use super::ListingEntry;

/// Sort entries in place. The sort is stable, so entries that compare equal keep
/// their server order.
pub fn sort_entries(entries: &mut [ListingEntry], sort_by: SortBy, sort_order: SortOrder) {
    entries.sort_by(|a, b| {
        let ordering = cmp_entries(a, b, sort_by);
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn cmp_entries(a: &ListingEntry, b: &ListingEntry, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        // Entries without a readable timestamp sort as the oldest
        SortBy::ModTime => a.modified().cmp(&b.modified()),
        SortBy::Size => a.size.cmp(&b.size),
    }
}
