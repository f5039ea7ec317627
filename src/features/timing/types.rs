//! Timing data types
//!
//! `RawTimingRecord` is what the timing endpoint returns; `TimingEntry` is the
//! validated form held by a `TimingTable`.

use serde::{Deserialize, Serialize};

/// A point in page-graphic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Outline of an ayah on a vector page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon(pub Vec<Point>);

impl Polygon {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// A polygon needs at least three points to enclose anything
    pub fn is_drawable(&self) -> bool {
        self.0.len() >= 3 && self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Parse an SVG `points` attribute (`"x,y x,y ..."`, commas or spaces)
    pub fn parse_svg_points(src: &str) -> Option<Self> {
        let numbers: Vec<f32> = src
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f32>().ok())
            .collect::<Option<_>>()?;

        if numbers.is_empty() || numbers.len() % 2 != 0 {
            return None;
        }

        Some(Polygon(
            numbers
                .chunks_exact(2)
                .map(|pair| Point::new(pair[0], pair[1]))
                .collect(),
        ))
    }

    /// Render as an SVG `points` attribute value
    pub fn to_svg_points(&self) -> String {
        self.0
            .iter()
            .map(|p| format!("{},{}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Polygon as it appears on the wire: a list of pairs or an SVG points string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPolygon {
    Pairs(Vec<[f32; 2]>),
    Svg(String),
}

impl RawPolygon {
    pub fn into_polygon(self) -> Option<Polygon> {
        match self {
            RawPolygon::Pairs(pairs) => Some(Polygon(
                pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect(),
            )),
            RawPolygon::Svg(points) => Polygon::parse_svg_points(&points),
        }
    }
}

/// One record from the timing endpoint, before validation
///
/// Signed integers so that bad values reach the table (and get reported)
/// instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimingRecord {
    #[serde(alias = "verse")]
    pub ayah: i64,
    #[serde(alias = "start_time_ms", alias = "start", alias = "time")]
    pub start_time_ms: i64,
    #[serde(default)]
    pub polygon: Option<RawPolygon>,
}

impl RawTimingRecord {
    pub fn new(ayah: i64, start_time_ms: i64) -> Self {
        Self {
            ayah,
            start_time_ms,
            polygon: None,
        }
    }

    pub fn with_polygon(mut self, points: &[(f32, f32)]) -> Self {
        self.polygon = Some(RawPolygon::Pairs(
            points.iter().map(|&(x, y)| [x, y]).collect(),
        ));
        self
    }
}

/// A validated timing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingEntry {
    pub ayah: u32,
    pub start_time_ms: u64,
    pub polygon: Option<Polygon>,
}

/// The verse active at some playback position
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAyah {
    pub ayah: u32,
    pub polygon: Option<Polygon>,
}

impl From<&TimingEntry> for ResolvedAyah {
    fn from(entry: &TimingEntry) -> Self {
        Self {
            ayah: entry.ayah,
            polygon: entry.polygon.clone(),
        }
    }
}

/// Identifies which recitation a table belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecitationKey {
    pub chapter: u16,
    pub reciter: String,
}

impl RecitationKey {
    pub fn new(chapter: u16, reciter: impl Into<String>) -> Self {
        Self {
            chapter,
            reciter: reciter.into(),
        }
    }
}

impl std::fmt::Display for RecitationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chapter, self.reciter)
    }
}
