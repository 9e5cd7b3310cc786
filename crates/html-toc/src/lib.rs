//! Table-of-contents generation for rendered HTML.
//!
//! Headings are pulled from the markup, rebuilt into an outline tree and
//! rendered as nested lists wherever a `[toc]` placeholder appears.

mod error;
mod filter;
mod heading;
mod render;
mod tree;

pub use error::LevelError;
pub use filter::{
    render_toc, TocFilter, TocOptions, DEFAULT_CONTAINER_CLASS, DEFAULT_PLACEHOLDER,
};
pub use heading::{HeadingExtractor, HeadingLevel, HeadingRecord, MarkupExtractor};
pub use render::{render_forest, Placeholder};
pub use tree::{build_forest, TocNode};
