//! Content sources
//!
//! Provides the `ContentSource` abstraction plus in-memory and HTTP implementations.

mod http;
mod source;

pub use http::HttpSource;
pub use source::{ChapterMeta, ContentSource, StaticSource};
