//! Highlight capability interface
//!
//! A target only knows how to add and remove one highlight. The two kinds
//! are a tagged variant, so nothing downstream inspects the surface at
//! runtime to decide how to paint.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::features::TargetKind;
use crate::features::settings::HighlightSettings;
use crate::features::timing::{Polygon, RecitationKey, ResolvedAyah};

/// Failure to reach into a render surface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("document has not finished loading")]
    NotLoaded,

    #[error("document is not accessible: {reason}")]
    Inaccessible { reason: String },

    #[error("highlight element no longer exists")]
    StaleHandle,
}

/// Identifier of a shape injected into a vector document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u64);

/// Identifier of a tagged text node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Visual style of the injected polygon
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeStyle {
    pub class: String,
    pub fill: String,
    pub pulse_period_ms: u32,
}

impl From<&HighlightSettings> for ShapeStyle {
    fn from(settings: &HighlightSettings) -> Self {
        Self {
            class: settings.active_class.clone(),
            fill: settings.fill.clone(),
            pulse_period_ms: settings.pulse_period_ms,
        }
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self::from(&HighlightSettings::default())
    }
}

/// Everything a vector document needs to draw one highlight
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightShape {
    pub chapter: u16,
    pub ayah: u32,
    pub polygon: Polygon,
    pub style: ShapeStyle,
}

/// A page graphic that can be decorated with shapes
pub trait VectorDocument {
    fn is_loaded(&self) -> bool;

    fn insert_shape(&mut self, shape: &HighlightShape) -> Result<ShapeId, RenderError>;

    fn remove_shape(&mut self, id: ShapeId) -> Result<(), RenderError>;
}

/// A page of text nodes, each tagged with its ayah number
pub trait TextSurface {
    fn find_node(&self, ayah: u32) -> Option<NodeId>;

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError>;

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError>;

    fn scroll_into_view(&mut self, node: NodeId, smooth: bool);
}

// Shared documents: the host keeps one clone to feed load completion and
// read back the decorated output, the renderer holds the other.
impl<T: VectorDocument + ?Sized> VectorDocument for Rc<RefCell<T>> {
    fn is_loaded(&self) -> bool {
        self.try_borrow().map(|doc| doc.is_loaded()).unwrap_or(false)
    }

    fn insert_shape(&mut self, shape: &HighlightShape) -> Result<ShapeId, RenderError> {
        self.try_borrow_mut()
            .map_err(|e| RenderError::Inaccessible {
                reason: e.to_string(),
            })?
            .insert_shape(shape)
    }

    fn remove_shape(&mut self, id: ShapeId) -> Result<(), RenderError> {
        self.try_borrow_mut()
            .map_err(|e| RenderError::Inaccessible {
                reason: e.to_string(),
            })?
            .remove_shape(id)
    }
}

impl<T: TextSurface + ?Sized> TextSurface for Rc<RefCell<T>> {
    fn find_node(&self, ayah: u32) -> Option<NodeId> {
        self.try_borrow().ok()?.find_node(ayah)
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError> {
        self.try_borrow_mut()
            .map_err(|e| RenderError::Inaccessible {
                reason: e.to_string(),
            })?
            .add_class(node, class)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError> {
        self.try_borrow_mut()
            .map_err(|e| RenderError::Inaccessible {
                reason: e.to_string(),
            })?
            .remove_class(node, class)
    }

    fn scroll_into_view(&mut self, node: NodeId, smooth: bool) {
        if let Ok(mut surface) = self.try_borrow_mut() {
            surface.scroll_into_view(node, smooth);
        }
    }
}

/// Ownership token for a painted highlight. Not `Clone`: whoever holds it
/// is responsible for removing it with `remove_highlight`, and keeps it
/// until that succeeds.
#[derive(Debug, PartialEq, Eq)]
pub struct HighlightHandle {
    chapter: u16,
    ayah: u32,
    mark: Mark,
}

#[derive(Debug, PartialEq, Eq)]
enum Mark {
    Shape(ShapeId),
    Class(NodeId),
}

impl HighlightHandle {
    pub fn chapter(&self) -> u16 {
        self.chapter
    }

    pub fn ayah(&self) -> u32 {
        self.ayah
    }
}

/// Vector page target
pub struct VectorTarget {
    document: Box<dyn VectorDocument>,
    style: ShapeStyle,
}

/// Tagged text target
pub struct TextTarget {
    surface: Box<dyn TextSurface>,
    active_class: String,
    smooth_scroll: bool,
}

/// Where highlights are painted
pub enum HighlightTarget {
    Vector(VectorTarget),
    Text(TextTarget),
}

impl std::fmt::Debug for HighlightTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HighlightTarget::Vector(t) => f
                .debug_struct("Vector")
                .field("loaded", &t.document.is_loaded())
                .field("style", &t.style)
                .finish_non_exhaustive(),
            HighlightTarget::Text(t) => f
                .debug_struct("Text")
                .field("active_class", &t.active_class)
                .field("smooth_scroll", &t.smooth_scroll)
                .finish_non_exhaustive(),
        }
    }
}

impl HighlightTarget {
    pub fn vector(document: impl VectorDocument + 'static, style: ShapeStyle) -> Self {
        HighlightTarget::Vector(VectorTarget {
            document: Box::new(document),
            style,
        })
    }

    pub fn text(
        surface: impl TextSurface + 'static,
        active_class: impl Into<String>,
        smooth_scroll: bool,
    ) -> Self {
        HighlightTarget::Text(TextTarget {
            surface: Box::new(surface),
            active_class: active_class.into(),
            smooth_scroll,
        })
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            HighlightTarget::Vector(_) => TargetKind::Vector,
            HighlightTarget::Text(_) => TargetKind::Text,
        }
    }

    /// Paint `ayah`. `Ok(None)` means there was nothing to paint (no
    /// geometry, or no matching node).
    pub fn add_highlight(
        &mut self,
        key: &RecitationKey,
        ayah: &ResolvedAyah,
    ) -> Result<Option<HighlightHandle>, RenderError> {
        match self {
            HighlightTarget::Vector(target) => {
                let Some(polygon) = &ayah.polygon else {
                    return Ok(None);
                };
                if !target.document.is_loaded() {
                    return Err(RenderError::NotLoaded);
                }
                let shape = HighlightShape {
                    chapter: key.chapter,
                    ayah: ayah.ayah,
                    polygon: polygon.clone(),
                    style: target.style.clone(),
                };
                let id = target.document.insert_shape(&shape)?;
                Ok(Some(HighlightHandle {
                    chapter: key.chapter,
                    ayah: ayah.ayah,
                    mark: Mark::Shape(id),
                }))
            }
            HighlightTarget::Text(target) => {
                let Some(node) = target.surface.find_node(ayah.ayah) else {
                    return Ok(None);
                };
                target.surface.add_class(node, &target.active_class)?;
                target.surface.scroll_into_view(node, target.smooth_scroll);
                Ok(Some(HighlightHandle {
                    chapter: key.chapter,
                    ayah: ayah.ayah,
                    mark: Mark::Class(node),
                }))
            }
        }
    }

    pub fn remove_highlight(&mut self, handle: &HighlightHandle) -> Result<(), RenderError> {
        match (self, &handle.mark) {
            (HighlightTarget::Vector(target), Mark::Shape(id)) => target.document.remove_shape(*id),
            (HighlightTarget::Text(target), Mark::Class(node)) => {
                target.surface.remove_class(*node, &target.active_class)
            }
            _ => Err(RenderError::StaleHandle),
        }
    }
}
