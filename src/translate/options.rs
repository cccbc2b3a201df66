//! Orchestration options.

use crate::annotate::AlignOptions;

/// Options for translation and span annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatorOptions {
    /// Maximum concurrent translation requests
    pub translation_concurrency: usize,

    /// Maximum concurrent span-detection requests
    pub span_concurrency: usize,

    /// Minimum line count of a paragraph to be translated
    pub min_line_count: u32,

    /// Characters of paragraph text sent for span detection
    pub span_text_limit: usize,

    /// Whether a visible page also triggers the following page
    pub prefetch_next_page: bool,

    /// Bracket alignment options
    pub align: AlignOptions,

    /// Translation stored for paragraphs without extractable text
    pub empty_text_placeholder: String,
}

impl AnnotatorOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the translation concurrency.
    pub fn with_translation_concurrency(mut self, limit: usize) -> Self {
        self.translation_concurrency = limit;
        self
    }

    /// Set the span-detection concurrency.
    pub fn with_span_concurrency(mut self, limit: usize) -> Self {
        self.span_concurrency = limit;
        self
    }

    /// Set the minimum line count.
    pub fn with_min_line_count(mut self, lines: u32) -> Self {
        self.min_line_count = lines;
        self
    }

    /// Enable or disable next-page prefetch.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch_next_page = prefetch;
        self
    }

    /// Set the alignment options.
    pub fn with_align(mut self, align: AlignOptions) -> Self {
        self.align = align;
        self
    }
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        Self {
            translation_concurrency: 10,
            span_concurrency: 6,
            min_line_count: 2,
            span_text_limit: 1200,
            prefetch_next_page: true,
            align: AlignOptions::default(),
            empty_text_placeholder: "(テキストが抽出できませんでした)".to_string(),
        }
    }
}
