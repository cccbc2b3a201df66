//! Paragraph records and their annotation lifecycle.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, TokenPosition};

/// Translation lifecycle of a paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    /// Not attempted yet
    #[default]
    Idle,
    /// Request outstanding
    Translating,
    /// Translation stored
    Done,
    /// Request failed; message in `error`
    Error,
    /// Excluded by the host application. The controller never assigns it
    /// and never translates a paragraph carrying it.
    Skipped,
}

impl TranslationStatus {
    /// Whether the paragraph reached a final state for this session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranslationStatus::Done | TranslationStatus::Error | TranslationStatus::Skipped
        )
    }
}

/// Span-detection lifecycle of a paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Not attempted yet
    #[default]
    Idle,
    /// Request outstanding
    Processing,
    /// Spans stored
    Done,
    /// Request failed
    Error,
}

/// Grammatical role of a detected span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanRole {
    /// Object
    O,
    /// Complement
    C,
}

impl SpanRole {
    /// Parse a bracket label (`O` / `C`, case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "O" => Some(SpanRole::O),
            "C" => Some(SpanRole::C),
            _ => None,
        }
    }
}

/// Inclusive token range carrying a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Role of the span
    pub role: SpanRole,
    /// First token index
    pub start: usize,
    /// Last token index (inclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(role: SpanRole, start: usize, end: usize) -> Self {
        Self { role, start, end }
    }

    /// Number of tokens covered, both ends inclusive.
    pub fn token_count(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }
}

/// Result of span detection for one paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanTargets {
    /// Tokens as echoed by the service
    pub tokens: Vec<String>,
    /// Bracket-annotated token stream as returned by the service
    pub bracket: String,
    /// Spans aligned onto the paragraph's own token indices
    pub targets: Vec<Span>,
}

/// Link between the two halves of a paragraph split by a column break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeLink {
    /// Group identifier shared by both halves
    pub group_id: String,
    /// 0 for the half that comes first in reading order, 1 for the other
    pub index: u8,
}

/// A reconstructed paragraph with its annotation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Page-scoped identifier
    pub id: String,

    /// Concatenated text of the constituent runs
    pub text: String,

    /// Bounding box containing every constituent run
    pub bbox: BoundingBox,

    /// Number of distinct text lines
    pub line_count: u32,

    /// Heuristic formula classification
    pub is_math_like: bool,

    /// Merge-group membership across a column break
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeLink>,

    /// Approximate token placement for overlays
    #[serde(default)]
    pub token_positions: Vec<TokenPosition>,

    /// Translation lifecycle
    #[serde(default)]
    pub status: TranslationStatus,

    /// Translated text
    #[serde(default)]
    pub translation: String,

    /// Last failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Span-detection lifecycle
    #[serde(default)]
    pub span_status: SpanStatus,

    /// Span-detection result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_targets: Option<SpanTargets>,
}

impl Paragraph {
    /// Create a single-line paragraph.
    pub fn new(id: impl Into<String>, text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            bbox,
            line_count: 1,
            is_math_like: false,
            merge: None,
            token_positions: Vec::new(),
            status: TranslationStatus::Idle,
            translation: String::new(),
            error: None,
            span_status: SpanStatus::Idle,
            span_targets: None,
        }
    }

    /// Set the line count.
    pub fn with_line_count(mut self, line_count: u32) -> Self {
        self.line_count = line_count;
        self
    }

    /// Link the paragraph into a merge group.
    pub fn with_merge(mut self, group_id: impl Into<String>, index: u8) -> Self {
        self.merge = Some(MergeLink {
            group_id: group_id.into(),
            index,
        });
        self
    }

    /// Whether any non-whitespace text was extracted.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Whether the paragraph qualifies for translation and span detection.
    pub fn is_eligible(&self, min_line_count: u32) -> bool {
        self.line_count >= min_line_count && !self.is_math_like
    }

    /// Merge group id, if any.
    pub fn merge_group(&self) -> Option<&str> {
        self.merge.as_ref().map(|m| m.group_id.as_str())
    }

    /// Index within the merge group, if any.
    pub fn merge_index(&self) -> Option<u8> {
        self.merge.as_ref().map(|m| m.index)
    }

    /// Whitespace tokens of the paragraph text.
    pub fn tokens(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: &ParagraphPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref translation) = patch.translation {
            self.translation = translation.clone();
        }
        if let Some(ref error) = patch.error {
            self.error = error.clone();
        }
        if let Some(span_status) = patch.span_status {
            self.span_status = span_status;
        }
        if let Some(ref targets) = patch.span_targets {
            self.span_targets = targets.clone();
        }
    }

    /// Return every annotation field to its initial state.
    pub fn reset_annotations(&mut self) {
        self.status = TranslationStatus::Idle;
        self.translation.clear();
        self.error = None;
        self.span_status = SpanStatus::Idle;
        self.span_targets = None;
    }
}

/// Partial field set applied to one paragraph.
///
/// Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphPatch {
    /// New translation status
    pub status: Option<TranslationStatus>,
    /// New translation text
    pub translation: Option<String>,
    /// New error message (`Some(None)` clears it)
    pub error: Option<Option<String>>,
    /// New span status
    pub span_status: Option<SpanStatus>,
    /// New span targets (`Some(None)` clears them)
    pub span_targets: Option<Option<SpanTargets>>,
}

impl ParagraphPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the translation status.
    pub fn status(mut self, status: TranslationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the translation text.
    pub fn translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Set the error message.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(Some(message.into()));
        self
    }

    /// Set the span status.
    pub fn span_status(mut self, status: SpanStatus) -> Self {
        self.span_status = Some(status);
        self
    }

    /// Set the span targets.
    pub fn span_targets(mut self, targets: SpanTargets) -> Self {
        self.span_targets = Some(Some(targets));
        self
    }

    /// Check if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
