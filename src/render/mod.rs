//! Rendering module for presenting annotated documents.

mod json;
mod options;
pub mod overlay;
mod text;

pub use json::{to_json, to_json_with_options, JsonFormat};
pub use options::{PageSelection, RenderOptions};
pub use overlay::{page_overlay, paragraph_overlay, Highlight, ParagraphOverlay};
pub use text::to_text;
