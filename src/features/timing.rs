//! Ayah timing - tables and resolution
//!
//! - `types`: wire records and validated entries
//! - `table`: `TimingTable`, the sorted per-recitation lookup
//! - `resolver`: edge-triggered current-ayah tracking

mod resolver;
mod table;
mod types;

pub use resolver::*;
pub use table::*;
pub use types::*;

use serde::Deserialize;

/// Timing documents come either as a bare array or wrapped in an object
#[derive(Deserialize)]
#[serde(untagged)]
enum TimingDocument {
    List(Vec<RawTimingRecord>),
    Wrapped {
        #[serde(alias = "ayahs", alias = "verses")]
        timings: Vec<RawTimingRecord>,
    },
}

/// Parse a timing document from JSON
pub fn parse_timing_json(content: &str) -> Result<Vec<RawTimingRecord>, serde_json::Error> {
    let doc: TimingDocument = serde_json::from_str(content)?;
    Ok(match doc {
        TimingDocument::List(records) | TimingDocument::Wrapped { timings: records } => records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_list() {
        let records = parse_timing_json(r#"[{"ayah":1,"startTimeMs":0}]"#).unwrap();
        assert_eq!(records, vec![RawTimingRecord::new(1, 0)]);
    }

    #[test]
    fn test_parse_wrapped() {
        let json = r#"{"verses":[{"ayah":1,"start":0},{"ayah":2,"start":4100}]}"#;
        let records = parse_timing_json(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].start_time_ms, 4100);
    }

    #[test]
    fn test_parse_rejects_non_timing() {
        assert!(parse_timing_json(r#"{"foo": 1}"#).is_err());
    }
}
