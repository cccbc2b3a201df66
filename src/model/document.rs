//! Document-level types.

use super::Page;
use serde::{Deserialize, Serialize};

/// All pages of one loaded document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Pages in the document
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Create a document from pages.
    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == page_num)
    }

    /// Get a mutable page by number (1-indexed).
    pub fn get_page_mut(&mut self, page_num: u32) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.number == page_num)
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Total number of paragraphs.
    pub fn paragraph_count(&self) -> usize {
        self.pages.iter().map(|p| p.paragraphs.len()).sum()
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Loading state of the document, also used to surface the global
/// configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoadState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Pages are being extracted
    Loading,
    /// Pages are available
    Ready,
    /// Loading or configuration failed
    Error {
        /// Human-readable message
        message: String,
    },
}

impl LoadState {
    /// Check if this is an error state.
    pub fn is_error(&self) -> bool {
        matches!(self, LoadState::Error { .. })
    }
}
