//! Layout reconstruction options.

/// Thresholds used when turning text runs into paragraphs.
///
/// The defaults were tuned on two-column academic papers rendered at a
/// scale of about 1.2; they are heuristics, not invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Vertical distance (layout units) beyond which a run starts a new line
    pub line_threshold: f32,

    /// Gap multiplier of the larger run height that starts a new paragraph
    pub paragraph_gap_ratio: f32,

    /// Minimum indentation (layout units) that starts a new paragraph
    pub indent_min: f32,

    /// Indentation threshold as a multiple of the running average char width
    pub indent_char_ratio: f32,

    /// Symbol ratio above which text may be a formula
    pub math_symbol_ratio: f32,

    /// Short-token ratio above which text may be a formula
    pub math_short_token_ratio: f32,

    /// Maximum length of a token counted as short
    pub short_token_len: usize,

    /// Whether to lay out pages in parallel
    pub parallel: bool,
}

impl LayoutOptions {
    /// Create new layout options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line-break threshold.
    pub fn with_line_threshold(mut self, threshold: f32) -> Self {
        self.line_threshold = threshold;
        self
    }

    /// Set the paragraph-gap ratio.
    pub fn with_paragraph_gap_ratio(mut self, ratio: f32) -> Self {
        self.paragraph_gap_ratio = ratio;
        self
    }

    /// Set the indentation thresholds.
    pub fn with_indent(mut self, min: f32, char_ratio: f32) -> Self {
        self.indent_min = min;
        self.indent_char_ratio = char_ratio;
        self
    }

    /// Set the formula classification ratios.
    pub fn with_math_ratios(mut self, symbol_ratio: f32, short_token_ratio: f32) -> Self {
        self.math_symbol_ratio = symbol_ratio;
        self.math_short_token_ratio = short_token_ratio;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            line_threshold: 6.0,
            paragraph_gap_ratio: 1.4,
            indent_min: 8.0,
            indent_char_ratio: 2.0,
            math_symbol_ratio: 0.08,
            math_short_token_ratio: 0.5,
            short_token_len: 2,
            parallel: true,
        }
    }
}
