//! Current-ayah resolution
//!
//! `resolve_ayah` is pure. `AyahResolver` remembers the last published ayah
//! and only reports a change when the resolved ayah differs from it.

use std::sync::Arc;

use super::table::TimingTable;
use super::types::{RecitationKey, ResolvedAyah};

/// Resolve the active ayah for `position_ms`.
///
/// `previous` is a hint: when it is still active the same value is returned
/// without searching the table.
pub fn resolve_ayah(
    table: &TimingTable,
    position_ms: u64,
    previous: Option<&ResolvedAyah>,
) -> Option<ResolvedAyah> {
    if let Some(prev) = previous {
        if let Some(entry) = table.entry_at(position_ms) {
            if entry.ayah == prev.ayah {
                return Some(prev.clone());
            }
        }
    }
    table.resolve(position_ms)
}

/// Emitted when the active ayah changes
#[derive(Debug, Clone, PartialEq)]
pub struct AyahChange {
    pub key: RecitationKey,
    /// `None` when no ayah is active any more (e.g. seek before the first entry)
    pub current: Option<ResolvedAyah>,
    pub previous: Option<u32>,
}

/// Edge-triggered adapter around `resolve_ayah`
#[derive(Debug, Clone)]
pub struct AyahResolver {
    table: Arc<TimingTable>,
    previous: Option<ResolvedAyah>,
}

impl AyahResolver {
    pub fn new(table: Arc<TimingTable>) -> Self {
        Self {
            table,
            previous: None,
        }
    }

    pub fn table(&self) -> &Arc<TimingTable> {
        &self.table
    }

    pub fn current(&self) -> Option<&ResolvedAyah> {
        self.previous.as_ref()
    }

    /// Swap in a new table. The remembered ayah is cleared, so the first
    /// position on the new table always reports.
    pub fn replace_table(&mut self, table: Arc<TimingTable>) {
        self.table = table;
        self.previous = None;
    }

    /// Feed a position; returns a change only when the ayah differs from the last one
    pub fn update(&mut self, position_ms: u64) -> Option<AyahChange> {
        let resolved = resolve_ayah(&self.table, position_ms, self.previous.as_ref());

        let prev_ayah = self.previous.as_ref().map(|r| r.ayah);
        if resolved.as_ref().map(|r| r.ayah) == prev_ayah {
            return None;
        }

        tracing::debug!(
            "Ayah changed on {}: {:?} -> {:?} at {}ms",
            self.table.key(),
            prev_ayah,
            resolved.as_ref().map(|r| r.ayah),
            position_ms
        );

        self.previous = resolved.clone();
        Some(AyahChange {
            key: self.table.key().clone(),
            current: resolved,
            previous: prev_ayah,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::timing::RawTimingRecord;

    fn table(chapter: u16, pairs: &[(i64, i64)]) -> Arc<TimingTable> {
        Arc::new(TimingTable::new(
            RecitationKey::new(chapter, "husary"),
            pairs
                .iter()
                .map(|&(ayah, start)| RawTimingRecord::new(ayah, start))
                .collect(),
        ))
    }

    #[test]
    fn test_same_position_signals_once() {
        let mut resolver = AyahResolver::new(table(1, &[(1, 0), (2, 5000)]));
        let first = resolver.update(100).expect("first update should signal");
        assert_eq!(first.current.unwrap().ayah, 1);
        assert_eq!(first.previous, None);
        assert_eq!(resolver.update(100), None);
        assert_eq!(resolver.update(4999), None);
    }

    #[test]
    fn test_signals_on_each_transition() {
        let mut resolver = AyahResolver::new(table(1, &[(1, 0), (2, 5000), (3, 9000)]));
        let ayahs: Vec<Option<u32>> = [0, 10, 5000, 5001, 9000, 200]
            .into_iter()
            .filter_map(|pos| resolver.update(pos))
            .map(|change| change.current.map(|r| r.ayah))
            .collect();
        assert_eq!(ayahs, vec![Some(1), Some(2), Some(3), Some(1)]);
    }

    #[test]
    fn test_seek_before_first_entry_clears() {
        let mut resolver = AyahResolver::new(table(1, &[(1, 1000)]));
        assert!(resolver.update(1500).is_some());
        let change = resolver.update(10).expect("should signal clear");
        assert_eq!(change.current, None);
        assert_eq!(change.previous, Some(1));
        assert_eq!(resolver.update(20), None);
    }

    #[test]
    fn test_replace_table_resignals_same_number() {
        let mut resolver = AyahResolver::new(table(1, &[(1, 0)]));
        assert!(resolver.update(0).is_some());
        resolver.replace_table(table(2, &[(1, 0)]));
        let change = resolver.update(0).expect("new chapter must signal");
        assert_eq!(change.key.chapter, 2);
        assert_eq!(change.current.unwrap().ayah, 1);
    }

    #[test]
    fn test_empty_table_never_signals() {
        let mut resolver = AyahResolver::new(table(1, &[]));
        for pos in [0, 100, 1_000_000] {
            assert_eq!(resolver.update(pos), None);
        }
    }

    #[test]
    fn test_pure_resolve_uses_hint() {
        let t = table(1, &[(1, 0), (2, 5000)]);
        let prev = t.resolve(10);
        assert_eq!(resolve_ayah(&t, 20, prev.as_ref()), prev);
        assert_eq!(resolve_ayah(&t, 6000, prev.as_ref()).unwrap().ayah, 2);
    }
}
