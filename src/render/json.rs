//! JSON rendering for annotated documents.

use crate::error::{Error, Result};
use crate::model::Document;

use super::RenderOptions;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a document to JSON.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc),
        JsonFormat::Compact => serde_json::to_string(doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Convert the selected pages of a document to JSON.
pub fn to_json_with_options(
    doc: &Document,
    format: JsonFormat,
    options: &RenderOptions,
) -> Result<String> {
    let selected = Document::from_pages(
        doc.pages
            .iter()
            .filter(|page| options.page_selection.includes(page.number))
            .cloned()
            .collect(),
    );
    to_json(&selected, format)
}
