use std::collections::HashSet;

use crate::models::ResultItem;

/// Merged result list plus how many duplicates were dropped while merging.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interleaved {
    pub items: Vec<ResultItem>,
    pub duplicates_removed: usize,
}

/// Round-robin merge of ranked result sets.
///
/// Round `r` takes the `r`-th item of every set, in the order the sets are
/// given; exhausted sets stop contributing. An item whose identity (see
/// [`ResultItem::key`]) was already emitted is skipped and counted.
pub fn interleave(sets: &[Vec<ResultItem>]) -> Interleaved {
    let total: usize = sets.iter().map(Vec::len).sum();
    let rounds = sets.iter().map(Vec::len).max().unwrap_or(0);

    let mut seen = HashSet::with_capacity(total);
    let mut items = Vec::with_capacity(total);

    for round in 0..rounds {
        for item in sets.iter().filter_map(|set| set.get(round)) {
            if seen.insert(item.key()) {
                items.push(item.clone());
            }
        }
    }

    Interleaved {
        duplicates_removed: total - items.len(),
        items,
    }
}
