//! Document model types for the reconstructed text layer.
//!
//! This module defines the records shared by the layout pass, the state
//! store and the renderers: positioned runs, paragraphs with their
//! annotation lifecycle, pages and documents.

mod document;
mod geometry;
mod page;
mod paragraph;

pub use document::{Document, LoadState};
pub use geometry::{
    multiply, BoundingBox, Matrix, RawTextItem, TextRun, TokenPosition, Viewport, IDENTITY,
};
pub use page::Page;
pub use paragraph::{
    MergeLink, Paragraph, ParagraphPatch, Span, SpanRole, SpanStatus, SpanTargets,
    TranslationStatus,
};
