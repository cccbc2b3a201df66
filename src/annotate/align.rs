//! Alignment of bracket-annotated token streams onto source tokens.
//!
//! The service answers with a stream such as
//! `We show (O the effect ) of (C noise )`. Opening tokens `(O` / `(C`
//! push a frame, tokens ending in `)` close one frame per trailing paren,
//! and every other token is matched against the paragraph's own tokens
//! so that spans index the source text even when the echo drifts.

use unicode_normalization::UnicodeNormalization;

use crate::model::{Span, SpanRole};

/// Alignment tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignOptions {
    /// Maximum number of source tokens scanned ahead on a mismatch
    /// (`None` scans to the end).
    pub search_window: Option<usize>,
}

impl AlignOptions {
    /// Create options with an unbounded search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the forward search on mismatches.
    pub fn with_search_window(mut self, window: usize) -> Self {
        self.search_window = Some(window);
        self
    }
}

#[derive(Debug)]
struct Frame {
    role: Option<SpanRole>,
    start: Option<usize>,
}

struct Aligner<'a, S> {
    tokens: &'a [S],
    options: &'a AlignOptions,
    cursor: usize,
    stack: Vec<Frame>,
    spans: Vec<Span>,
}

impl<'a, S: AsRef<str>> Aligner<'a, S> {
    fn open(&mut self, label: &str) {
        self.stack.push(Frame {
            role: SpanRole::from_label(label),
            start: None,
        });
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if let (Some(role), Some(start)) = (frame.role, frame.start) {
            let end = start.max(self.cursor.saturating_sub(1));
            self.spans.push(Span::new(role, start, end));
        }
    }

    fn consume(&mut self, token: &str) {
        if self.cursor >= self.tokens.len() {
            return;
        }
        let wanted = normalize(token);
        let current = normalize(self.tokens[self.cursor].as_ref());

        if wanted.is_empty() || current.is_empty() || wanted == current {
            self.mark_starts();
            self.cursor += 1;
            return;
        }

        match self.search(&wanted) {
            Some(found) => {
                self.cursor = found;
                self.mark_starts();
                self.cursor += 1;
            }
            None => {
                log::trace!("token {:?} not found after index {}", token, self.cursor);
                self.mark_starts();
            }
        }
    }

    fn search(&self, wanted: &str) -> Option<usize> {
        let limit = match self.options.search_window {
            Some(window) => (self.cursor + window + 1).min(self.tokens.len()),
            None => self.tokens.len(),
        };
        (self.cursor..limit).find(|&i| normalize(self.tokens[i].as_ref()) == wanted)
    }

    fn mark_starts(&mut self) {
        let cursor = self.cursor;
        for frame in &mut self.stack {
            if frame.role.is_some() && frame.start.is_none() {
                frame.start = Some(cursor);
            }
        }
    }
}

/// Map a bracket-annotated stream onto `tokens`, returning spans in
/// closing order.
///
/// Unlabeled or unmatched frames yield no span; malformed input never
/// fails, it only produces fewer spans.
pub fn align_brackets<S: AsRef<str>>(
    bracket: &str,
    tokens: &[S],
    options: &AlignOptions,
) -> Vec<Span> {
    let mut aligner = Aligner {
        tokens,
        options,
        cursor: 0,
        stack: Vec::new(),
        spans: Vec::new(),
    };

    for part in bracket.split_whitespace() {
        if let Some(label) = part.strip_prefix('(') {
            aligner.open(label);
            continue;
        }

        if part.ends_with(')') {
            let text = part.trim_end_matches(')');
            let closes = part.len() - text.len();
            if !text.is_empty() {
                aligner.consume(text);
            }
            for _ in 0..closes {
                aligner.close();
            }
            continue;
        }

        aligner.consume(part);
    }

    aligner.spans
}

/// Comparison form of a token: NFKC, without quotes, brackets or
/// sentence punctuation, lowercased.
pub fn normalize(token: &str) -> String {
    token
        .nfkc()
        .filter(|c| !matches!(c, '“' | '”' | '"' | '(' | ')' | '.' | ',' | ';' | ':' | '!' | '?'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}
