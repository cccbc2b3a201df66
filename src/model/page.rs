//! Page-level types.

use super::Paragraph;
use serde::{Deserialize, Serialize};

/// A single page in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Paragraphs in reading order
    pub paragraphs: Vec<Paragraph>,
}

impl Page {
    /// Create a new page.
    pub fn new(number: u32, paragraphs: Vec<Paragraph>) -> Self {
        Self { number, paragraphs }
    }

    /// Get a paragraph by id.
    pub fn paragraph(&self, id: &str) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.id == id)
    }

    /// Get a mutable paragraph by id.
    pub fn paragraph_mut(&mut self, id: &str) -> Option<&mut Paragraph> {
        self.paragraphs.iter_mut().find(|p| p.id == id)
    }

    /// Members of a merge group, ordered by merge index.
    pub fn merge_group(&self, group_id: &str) -> Vec<&Paragraph> {
        let mut members: Vec<&Paragraph> = self
            .paragraphs
            .iter()
            .filter(|p| p.merge_group() == Some(group_id))
            .collect();
        members.sort_by_key(|p| p.merge_index().unwrap_or(0));
        members
    }

    /// Get plain text content of the page.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check if the page has no paragraphs.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}
