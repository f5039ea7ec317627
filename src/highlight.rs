//! Ayah highlighting
//!
//! - `target`: the add/remove capability and the `Vector` / `Text` variants
//! - `svg`: page graphics decorated with injected polygons
//! - `text`: in-memory tagged text nodes
//! - `renderer`: keeps exactly one highlight alive

mod renderer;
mod svg;
mod target;
mod text;

pub use renderer::HighlightRenderer;
pub use svg::{SvgError, SvgPage};
pub use target::{
    HighlightHandle, HighlightShape, HighlightTarget, NodeId, RenderError, ShapeId, ShapeStyle,
    TextSurface, VectorDocument,
};
pub use text::{MemoryTextSurface, TextNode};
