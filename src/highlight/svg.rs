//! SVG page documents
//!
//! The page asset is parsed once with quick-xml to find the root `<svg>`
//! element and where it closes. Injected shapes are kept aside and spliced in
//! front of `</svg>` when the decorated markup is requested, so the original
//! asset is never rewritten.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use thiserror::Error;

use super::target::{HighlightShape, RenderError, ShapeId, VectorDocument};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SvgError {
    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("root element is <{0}>, expected <svg>")]
    NotSvg(String),

    #[error("<svg> root has no closing tag")]
    Unclosed,
}

#[derive(Debug, Clone)]
struct ParsedSvg {
    markup: String,
    /// Byte offset of `</svg>` in `markup`
    close_at: usize,
    view_box: Option<[f32; 4]>,
}

#[derive(Debug, Clone)]
enum PageState {
    Pending,
    Loaded(ParsedSvg),
    Failed(String),
}

/// A vector page that accepts highlight shapes once it has loaded
#[derive(Debug, Clone)]
pub struct SvgPage {
    page: u32,
    state: PageState,
    shapes: Vec<(ShapeId, u32, String)>,
    next_id: u64,
}

impl SvgPage {
    /// A page whose asset is still loading
    pub fn pending(page: u32) -> Self {
        Self {
            page,
            state: PageState::Pending,
            shapes: Vec::new(),
            next_id: 1,
        }
    }

    /// A page built from already available markup
    pub fn from_markup(page: u32, markup: impl Into<String>) -> Result<Self, SvgError> {
        let mut doc = Self::pending(page);
        doc.finish_loading(markup)?;
        Ok(doc)
    }

    /// Deliver the asset. On a parse error the page becomes `Failed` and
    /// never accepts shapes.
    pub fn finish_loading(&mut self, markup: impl Into<String>) -> Result<(), SvgError> {
        match parse_svg(markup.into()) {
            Ok(parsed) => {
                tracing::debug!("SVG page {} loaded", self.page);
                self.state = PageState::Loaded(parsed);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("SVG page {} could not be parsed: {}", self.page, e);
                self.state = PageState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn view_box(&self) -> Option<[f32; 4]> {
        match &self.state {
            PageState::Loaded(parsed) => parsed.view_box,
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            PageState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Ayah numbers of the shapes currently injected
    pub fn highlighted_ayahs(&self) -> Vec<u32> {
        self.shapes.iter().map(|(_, ayah, _)| *ayah).collect()
    }

    /// The page with all injected shapes, or `None` before it has loaded
    pub fn to_markup(&self) -> Option<String> {
        let PageState::Loaded(parsed) = &self.state else {
            return None;
        };

        let injected: usize = self.shapes.iter().map(|(_, _, s)| s.len()).sum();
        let mut out = String::with_capacity(parsed.markup.len() + injected);
        out.push_str(&parsed.markup[..parsed.close_at]);
        for (_, _, shape) in &self.shapes {
            out.push_str(shape);
        }
        out.push_str(&parsed.markup[parsed.close_at..]);
        Some(out)
    }
}

impl VectorDocument for SvgPage {
    fn is_loaded(&self) -> bool {
        matches!(self.state, PageState::Loaded(_))
    }

    fn insert_shape(&mut self, shape: &HighlightShape) -> Result<ShapeId, RenderError> {
        match &self.state {
            PageState::Loaded(_) => {}
            PageState::Pending => return Err(RenderError::NotLoaded),
            PageState::Failed(reason) => {
                return Err(RenderError::Inaccessible {
                    reason: reason.clone(),
                });
            }
        }

        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.shapes.push((id, shape.ayah, shape_markup(shape)));
        Ok(id)
    }

    fn remove_shape(&mut self, id: ShapeId) -> Result<(), RenderError> {
        let before = self.shapes.len();
        self.shapes.retain(|(shape_id, _, _)| *shape_id != id);
        if self.shapes.len() == before {
            return Err(RenderError::StaleHandle);
        }
        Ok(())
    }
}

fn shape_markup(shape: &HighlightShape) -> String {
    let class = escape(shape.style.class.as_str());
    let fill = escape(shape.style.fill.as_str());
    format!(
        concat!(
            "<g class=\"{class}-layer\">",
            "<style>@keyframes {class}-pulse{{0%,100%{{opacity:.2}}50%{{opacity:.5}}}}</style>",
            "<polygon class=\"{class}\" data-chapter=\"{chapter}\" data-ayah=\"{ayah}\" ",
            "points=\"{points}\" fill=\"{fill}\" ",
            "style=\"animation:{class}-pulse {period}ms ease-in-out infinite\"/>",
            "</g>"
        ),
        class = class,
        chapter = shape.chapter,
        ayah = shape.ayah,
        points = shape.polygon.to_svg_points(),
        fill = fill,
        period = shape.style.pulse_period_ms,
    )
}

fn parse_svg(markup: String) -> Result<ParsedSvg, SvgError> {
    let mut reader = Reader::from_str(&markup);
    let mut depth = 0usize;
    let mut view_box = None;
    let mut close_at = None;

    loop {
        let before = usize::try_from(reader.buffer_position())
            .map_err(|e| SvgError::Xml(e.to_string()))?;

        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    let name = e.name();
                    if name.as_ref() != b"svg" {
                        return Err(SvgError::NotSvg(
                            String::from_utf8_lossy(name.as_ref()).into_owned(),
                        ));
                    }
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"viewBox" {
                            view_box = parse_view_box(&String::from_utf8_lossy(&attr.value));
                        }
                    }
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    let name = e.name();
                    if name.as_ref() != b"svg" {
                        return Err(SvgError::NotSvg(
                            String::from_utf8_lossy(name.as_ref()).into_owned(),
                        ));
                    }
                    return Err(SvgError::Unclosed);
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close_at = Some(before);
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => return Err(SvgError::Xml(e.to_string())),
        }
    }

    let close_at = close_at.ok_or(SvgError::Unclosed)?;
    Ok(ParsedSvg {
        markup,
        close_at,
        view_box,
    })
}

fn parse_view_box(value: &str) -> Option<[f32; 4]> {
    let parts: Vec<f32> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    parts.try_into().ok()
}
