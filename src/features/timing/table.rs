//! Per-recitation timing table
//!
//! Entries are kept sorted by start time so that resolution is a binary
//! search. Each entry covers `[start_i, start_{i+1})`; the last one runs to
//! the end of the audio.

use std::ops::Range;

use super::types::{RawTimingRecord, RecitationKey, ResolvedAyah, TimingEntry};

/// What had to be repaired while building a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimingDiagnostics {
    /// Records dropped because their ayah number was not positive
    pub dropped: usize,
    /// Negative start times clamped to zero
    pub clamped_starts: usize,
    /// Input was not sorted by start time
    pub was_unsorted: bool,
    /// Ayah numbers that appear more than once
    pub duplicate_ayahs: Vec<u32>,
    /// Ayah numbers decrease somewhere after sorting by time
    pub ayahs_out_of_order: bool,
    /// Polygons that could not be parsed or cannot be drawn
    pub invalid_polygons: usize,
}

impl TimingDiagnostics {
    pub fn is_clean(&self) -> bool {
        *self == TimingDiagnostics::default()
    }

    /// Human-readable summary, `None` when nothing was repaired
    pub fn describe(&self) -> Option<String> {
        if self.is_clean() {
            return None;
        }

        let mut parts = Vec::new();
        if self.dropped > 0 {
            parts.push(format!("{} record(s) without a valid ayah", self.dropped));
        }
        if self.clamped_starts > 0 {
            parts.push(format!("{} negative start time(s)", self.clamped_starts));
        }
        if self.was_unsorted {
            parts.push("records not sorted by start time".to_string());
        }
        if !self.duplicate_ayahs.is_empty() {
            parts.push(format!("duplicate ayahs {:?}", self.duplicate_ayahs));
        }
        if self.ayahs_out_of_order {
            parts.push("ayah numbers not increasing with time".to_string());
        }
        if self.invalid_polygons > 0 {
            parts.push(format!("{} unusable polygon(s)", self.invalid_polygons));
        }
        Some(parts.join(", "))
    }
}

/// Immutable mapping from playback time to the active ayah
#[derive(Debug, Clone, PartialEq)]
pub struct TimingTable {
    key: RecitationKey,
    entries: Vec<TimingEntry>,
    diagnostics: TimingDiagnostics,
}

impl TimingTable {
    /// Build a table from raw records, repairing what can be repaired
    pub fn new(key: RecitationKey, records: Vec<RawTimingRecord>) -> Self {
        let mut diagnostics = TimingDiagnostics::default();
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let Ok(ayah) = u32::try_from(record.ayah) else {
                diagnostics.dropped += 1;
                continue;
            };
            if ayah == 0 {
                diagnostics.dropped += 1;
                continue;
            }

            let start_time_ms = if record.start_time_ms < 0 {
                diagnostics.clamped_starts += 1;
                0
            } else {
                record.start_time_ms as u64
            };

            let polygon = match record.polygon.map(|p| p.into_polygon()) {
                None => None,
                Some(Some(polygon)) if polygon.is_drawable() => Some(polygon),
                Some(_) => {
                    diagnostics.invalid_polygons += 1;
                    None
                }
            };

            entries.push(TimingEntry {
                ayah,
                start_time_ms,
                polygon,
            });
        }

        Self::build(key, entries, diagnostics)
    }

    /// A table with no entries; every position resolves to `None`
    pub fn empty(key: RecitationKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
            diagnostics: TimingDiagnostics::default(),
        }
    }

    fn build(
        key: RecitationKey,
        mut entries: Vec<TimingEntry>,
        mut diagnostics: TimingDiagnostics,
    ) -> Self {
        if !entries.is_sorted_by_key(|e| e.start_time_ms) {
            diagnostics.was_unsorted = true;
            // Stable, so equal start times keep their input order
            entries.sort_by_key(|e| e.start_time_ms);
        }

        diagnostics.ayahs_out_of_order = entries.windows(2).any(|w| w[1].ayah < w[0].ayah);

        let mut seen = std::collections::BTreeMap::<u32, usize>::new();
        for entry in &entries {
            *seen.entry(entry.ayah).or_default() += 1;
        }
        diagnostics.duplicate_ayahs = seen
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(ayah, _)| ayah)
            .collect();

        if let Some(summary) = diagnostics.describe() {
            tracing::warn!("Timing table {} repaired: {}", key, summary);
        }

        Self {
            key,
            entries,
            diagnostics,
        }
    }

    pub fn key(&self) -> &RecitationKey {
        &self.key
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn diagnostics(&self) -> &TimingDiagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry with the greatest start time `<= position_ms`
    pub fn entry_at(&self, position_ms: u64) -> Option<&TimingEntry> {
        let idx = self
            .entries
            .partition_point(|e| e.start_time_ms <= position_ms);
        idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// The ayah active at `position_ms`, or `None` before the first entry
    pub fn resolve(&self, position_ms: u64) -> Option<ResolvedAyah> {
        self.entry_at(position_ms).map(ResolvedAyah::from)
    }

    pub fn first_ayah(&self) -> Option<u32> {
        self.entries.first().map(|e| e.ayah)
    }

    pub fn last_ayah(&self) -> Option<u32> {
        self.entries.last().map(|e| e.ayah)
    }

    /// First entry for `ayah` in playback order
    pub fn entry(&self, ayah: u32) -> Option<&TimingEntry> {
        self.entries.iter().find(|e| e.ayah == ayah)
    }

    pub fn start_of(&self, ayah: u32) -> Option<u64> {
        self.entry(ayah).map(|e| e.start_time_ms)
    }

    /// Half-open time range during which `ayah` is active
    pub fn interval(&self, ayah: u32, duration_ms: u64) -> Option<Range<u64>> {
        let idx = self.entries.iter().position(|e| e.ayah == ayah)?;
        let start = self.entries[idx].start_time_ms;
        let end = self
            .entries
            .get(idx + 1)
            .map(|next| next.start_time_ms)
            .unwrap_or(duration_ms)
            .max(start);
        Some(start..end)
    }
}
