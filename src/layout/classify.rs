//! Formula detection for reconstructed paragraphs.

use regex::Regex;

use super::LayoutOptions;

/// Classifies text as formula-like from its operator density and the share
/// of very short tokens.
#[derive(Debug, Clone)]
pub struct MathClassifier {
    symbol_regex: Regex,
    symbol_ratio: f32,
    short_token_ratio: f32,
    short_token_len: usize,
}

impl MathClassifier {
    /// Create a classifier using the thresholds in `options`.
    pub fn new(options: &LayoutOptions) -> Self {
        Self {
            symbol_regex: Regex::new(r"[=+\-×*/^_∑∫∂≤≥≈≠→←↔]").expect("valid symbol pattern"),
            symbol_ratio: options.math_symbol_ratio,
            short_token_ratio: options.math_short_token_ratio,
            short_token_len: options.short_token_len,
        }
    }

    /// Ratio of operator symbols to characters.
    pub fn symbol_ratio(&self, text: &str) -> f32 {
        let symbols = self.symbol_regex.find_iter(text).count();
        symbols as f32 / text.chars().count().max(1) as f32
    }

    /// Ratio of short tokens to all whitespace-delimited tokens.
    pub fn short_token_ratio(&self, text: &str) -> f32 {
        let mut total = 0usize;
        let mut short = 0usize;
        for token in text.split_whitespace() {
            total += 1;
            if token.chars().count() <= self.short_token_len {
                short += 1;
            }
        }
        short as f32 / total.max(1) as f32
    }

    /// Check whether the text looks like a formula.
    pub fn is_math_like(&self, text: &str) -> bool {
        self.symbol_ratio(text) > self.symbol_ratio
            && self.short_token_ratio(text) > self.short_token_ratio
    }
}

impl Default for MathClassifier {
    fn default() -> Self {
        Self::new(&LayoutOptions::default())
    }
}
