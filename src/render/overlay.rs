//! Highlight geometry for span overlays.
//!
//! Spans index the paragraph's whitespace tokens. When the layout pass
//! recorded a position for every token, highlights follow those positions
//! and break at line changes; otherwise token extents are estimated from
//! character counts across the paragraph width.

use serde::{Deserialize, Serialize};

use crate::model::{
    BoundingBox, Page, Paragraph, Span, SpanRole, SpanStatus, TokenPosition, TranslationStatus,
};

/// Minimum highlight height when token positions are known.
const MIN_TOKEN_HEIGHT: f32 = 10.0;

/// Minimum highlight height for estimated geometry.
const MIN_ESTIMATED_HEIGHT: f32 = 12.0;

/// Estimated highlight height as a share of the paragraph height.
const ESTIMATED_HEIGHT_RATIO: f32 = 0.22;

/// Baseline tolerance when grouping tokens into lines.
const LINE_TOLERANCE: f32 = 0.5;

/// One highlighted rectangle in page layout units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Role of the span
    pub role: SpanRole,
    /// Highlighted area
    pub rect: BoundingBox,
}

/// Overlay state of one paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphOverlay {
    /// Paragraph id
    pub paragraph_id: String,
    /// Paragraph bounding box
    pub bbox: BoundingBox,
    /// Translation status
    pub status: TranslationStatus,
    /// Span-detection status
    pub span_status: SpanStatus,
    /// Highlight rectangles
    pub highlights: Vec<Highlight>,
}

/// Overlays for every eligible paragraph that is being annotated, failed
/// annotation, or carries spans.
pub fn page_overlay(page: &Page, min_line_count: u32) -> Vec<ParagraphOverlay> {
    page.paragraphs
        .iter()
        .filter(|p| p.is_eligible(min_line_count))
        .filter_map(paragraph_overlay)
        .collect()
}

/// Overlay of one paragraph, or `None` when there is nothing to show.
pub fn paragraph_overlay(paragraph: &Paragraph) -> Option<ParagraphOverlay> {
    let in_progress = matches!(
        paragraph.span_status,
        SpanStatus::Processing | SpanStatus::Error
    );
    let spans = paragraph
        .span_targets
        .as_ref()
        .map(|t| t.targets.as_slice())
        .unwrap_or_default();
    if !in_progress && spans.is_empty() {
        return None;
    }

    let tokens = paragraph.tokens();
    let token_count = tokens.len().max(1);
    let positioned = paragraph.token_positions.len() >= token_count;

    let highlights = spans
        .iter()
        .flat_map(|span| {
            let start = span.start.min(token_count - 1);
            let end = span.end.min(token_count - 1).max(start);
            let rects = if positioned {
                positioned_rects(&paragraph.token_positions[start..=end])
            } else {
                vec![estimated_rect(paragraph, &tokens, start, end)]
            };
            rects
                .into_iter()
                .map(move |rect| Highlight {
                    role: span.role,
                    rect,
                })
        })
        .collect();

    Some(ParagraphOverlay {
        paragraph_id: paragraph.id.clone(),
        bbox: paragraph.bbox,
        status: paragraph.status,
        span_status: paragraph.span_status,
        highlights,
    })
}

/// One rectangle per line of the covered tokens.
fn positioned_rects(positions: &[TokenPosition]) -> Vec<BoundingBox> {
    let mut rects = Vec::new();
    let mut line: Vec<&TokenPosition> = Vec::new();

    for position in positions {
        if let Some(first) = line.first() {
            if (position.y - first.y).abs() > LINE_TOLERANCE {
                rects.push(line_rect(&line));
                line.clear();
            }
        }
        line.push(position);
    }
    if !line.is_empty() {
        rects.push(line_rect(&line));
    }
    rects
}

fn line_rect(line: &[&TokenPosition]) -> BoundingBox {
    let first = line[0];
    let last = line[line.len() - 1];
    BoundingBox::new(
        first.x,
        first.y - first.height,
        (last.x + last.width - first.x).max(0.0),
        first.height.max(MIN_TOKEN_HEIGHT),
    )
}

fn estimated_rect(paragraph: &Paragraph, tokens: &[&str], start: usize, end: usize) -> BoundingBox {
    let weights: Vec<usize> = tokens.iter().map(|t| t.chars().count().max(1)).collect();
    let total: usize = weights.iter().sum();
    let unit = if total > 0 {
        paragraph.bbox.width / total as f32
    } else {
        0.0
    };
    let before: usize = weights.iter().take(start).sum();
    let covered: usize = weights.iter().skip(start).take(end + 1 - start).sum();

    BoundingBox::new(
        paragraph.bbox.x + before as f32 * unit,
        paragraph.bbox.y + 2.0,
        covered as f32 * unit,
        (paragraph.bbox.height * ESTIMATED_HEIGHT_RATIO).max(MIN_ESTIMATED_HEIGHT),
    )
}

/// Spans of a paragraph with their token text, for textual inspection.
pub fn span_texts(paragraph: &Paragraph) -> Vec<(Span, String)> {
    let tokens = paragraph.tokens();
    let spans = paragraph
        .span_targets
        .as_ref()
        .map(|t| t.targets.as_slice())
        .unwrap_or_default();
    spans
        .iter()
        .filter(|span| span.start < tokens.len())
        .map(|span| {
            let end = span.end.min(tokens.len() - 1);
            (*span, tokens[span.start..=end].join(" "))
        })
        .collect()
}
