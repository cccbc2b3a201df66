//! Layout reconstruction: positioned text runs to paragraphs.
//!
//! Pages are independent, so [`build_document`] lays them out in parallel
//! with rayon unless [`LayoutOptions::sequential`] is set.

mod classify;
mod options;
mod reconstruct;

pub use classify::MathClassifier;
pub use options::LayoutOptions;
pub use reconstruct::{
    build_document, build_page, build_paragraphs, runs_bbox, PageInput, ParagraphBuilder,
};
