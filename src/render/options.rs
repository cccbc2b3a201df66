//! Rendering options and configuration.

use std::ops::RangeInclusive;

/// Options for rendering annotated documents.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Page selection
    pub page_selection: PageSelection,

    /// Include the source paragraph text next to the translation
    pub include_source: bool,

    /// Include paragraphs that are not eligible for translation
    pub include_ineligible: bool,

    /// Minimum line count of an eligible paragraph
    pub min_line_count: u32,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page selection.
    pub fn with_pages(mut self, selection: PageSelection) -> Self {
        self.page_selection = selection;
        self
    }

    /// Set specific page range.
    pub fn with_page_range(mut self, range: RangeInclusive<u32>) -> Self {
        self.page_selection = PageSelection::Range(range);
        self
    }

    /// Include or omit the source text.
    pub fn with_source(mut self, include: bool) -> Self {
        self.include_source = include;
        self
    }

    /// Include or omit ineligible paragraphs (headers, formulas).
    pub fn with_ineligible(mut self, include: bool) -> Self {
        self.include_ineligible = include;
        self
    }

    /// Set the minimum line count of an eligible paragraph.
    pub fn with_min_line_count(mut self, lines: u32) -> Self {
        self.min_line_count = lines;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_selection: PageSelection::All,
            include_source: true,
            include_ineligible: false,
            min_line_count: 2,
        }
    }
}

/// Page selection for rendering.
#[derive(Debug, Clone, Default)]
pub enum PageSelection {
    /// Render all pages
    #[default]
    All,
    /// Render a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Render specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start = parse_page(start, "Invalid start page")?;
                let end = parse_page(end, "Invalid end page")?;
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (
                    parse_page(start, "Invalid page number")?,
                    parse_page(end, "Invalid page number")?,
                ),
                None => {
                    let page = parse_page(part, "Invalid page number")?;
                    (page, page)
                }
            };
            pages.extend(start..=end);
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

fn parse_page(s: &str, message: &str) -> Result<u32, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("{}: '{}'", message, s.trim()))
}
