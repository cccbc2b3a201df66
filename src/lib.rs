//! # pdflingo
//!
//! Paragraph reconstruction and concurrent LLM translation for PDF text
//! layers.
//!
//! This library turns the positioned text items of a PDF page into
//! paragraphs and drives per-paragraph translation and object/complement
//! span detection through a language service while a reader scrolls.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdflingo::{AnnotationSession, AnnotatorOptions, LayoutOptions, ServiceConfig};
//!
//! # async fn run() -> pdflingo::Result<()> {
//! let pages = pdflingo::load_pages_file("runs.json")?;
//!
//! let session = AnnotationSession::new(
//!     ServiceConfig::new(std::env::var("OPENAI_API_KEY").unwrap_or_default()),
//!     AnnotatorOptions::default(),
//! );
//! session.load_document(&pages, &LayoutOptions::default());
//!
//! session.handle_page_visible(1);
//! session.flush().await;
//!
//! let text = pdflingo::render::to_text(&session.document(), &Default::default())?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Layout reconstruction**: lines, paragraphs, indentation and column
//!   breaks, formula detection, token geometry
//! - **Column merge groups**: paragraphs split across columns are
//!   translated as one request and re-split at sentence boundaries
//! - **Bounded concurrency**: FIFO task queues keyed by paragraph id
//! - **Span annotation**: bracket alignment tolerant of echo drift
//! - **Parallel processing**: Uses Rayon for multi-page layout

pub mod annotate;
pub mod error;
pub mod layout;
pub mod model;
pub mod queue;
pub mod render;
pub mod service;
pub mod session;
pub mod store;
pub mod translate;

// Re-export commonly used types
pub use annotate::{align_brackets, AlignOptions, SpanAnnotator};
pub use error::{Error, Result};
pub use layout::{build_document, build_page, build_paragraphs, LayoutOptions, PageInput};
pub use model::{
    BoundingBox, Document, LoadState, MergeLink, Page, Paragraph, ParagraphPatch, RawTextItem,
    Span, SpanRole, SpanStatus, SpanTargets, TextRun, TokenPosition, TranslationStatus, Viewport,
};
pub use queue::TaskQueue;
pub use render::{JsonFormat, PageSelection, RenderOptions};
pub use service::{LanguageService, OpenAiClient, ServiceConfig, ServiceProvider, SpanDetection};
pub use session::AnnotationSession;
pub use store::{DocumentStore, ParagraphStore, StoreEvent};
pub use translate::{split_by_ratio, AnnotatorOptions, TranslationController};

use std::path::Path;

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum PagesFile {
    Wrapped { pages: Vec<PageInput> },
    Bare(Vec<PageInput>),
}

/// Parse raw page input from JSON.
///
/// Accepts either `{"pages": [...]}` or a bare array of pages.
///
/// # Example
///
/// ```
/// let pages = pdflingo::parse_pages_json(
///     r#"{"pages":[{"number":1,"items":[{"text":"Hi","transform":[1,0,0,1,10,20],"width":8}]}]}"#,
/// ).unwrap();
/// assert_eq!(pages[0].items.len(), 1);
/// ```
pub fn parse_pages_json(data: &str) -> Result<Vec<PageInput>> {
    let file: PagesFile = serde_json::from_str(data)?;
    Ok(match file {
        PagesFile::Wrapped { pages } | PagesFile::Bare(pages) => pages,
    })
}

/// Read raw page input from a JSON file.
pub fn load_pages_file<P: AsRef<Path>>(path: P) -> Result<Vec<PageInput>> {
    let data = std::fs::read_to_string(path)?;
    parse_pages_json(&data)
}

/// Lay out a JSON file of raw pages into a document.
///
/// # Example
///
/// ```no_run
/// let doc = pdflingo::layout_file("runs.json", &pdflingo::LayoutOptions::default()).unwrap();
/// println!("Paragraphs: {}", doc.paragraph_count());
/// ```
pub fn layout_file<P: AsRef<Path>>(path: P, options: &LayoutOptions) -> Result<Document> {
    let pages = load_pages_file(path)?;
    Ok(build_document(&pages, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pages_json_forms() {
        let item = r#"{"text":"Hi","transform":[1,0,0,1,10,20],"width":8}"#;
        let wrapped = format!(r#"{{"pages":[{{"number":1,"items":[{}]}}]}}"#, item);
        let bare = format!(r#"[{{"number":2,"items":[{}]}}]"#, item);

        assert_eq!(parse_pages_json(&wrapped).unwrap()[0].number, 1);
        assert_eq!(parse_pages_json(&bare).unwrap()[0].number, 2);
        assert!(matches!(parse_pages_json("{}"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_pages_file("/nonexistent/runs.json"),
            Err(Error::Io(_))
        ));
    }
}
