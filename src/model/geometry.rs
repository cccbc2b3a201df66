//! Geometry types shared by the layout pass and the overlay renderer.

use serde::{Deserialize, Serialize};

/// A 2D affine transform in PDF order `[a, b, c, d, e, f]`.
pub type Matrix = [f32; 6];

/// Identity transform.
pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Concatenate two transforms (`m1 × m2`), the way a text item's matrix is
/// mapped through the page viewport.
pub fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[2] * m2[1],
        m1[1] * m2[0] + m1[3] * m2[1],
        m1[0] * m2[2] + m1[2] * m2[3],
        m1[1] * m2[2] + m1[3] * m2[3],
        m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
        m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
    ]
}

/// Axis-aligned rectangle in viewport space (y grows downward, `y` is the top edge).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box of a glyph run whose baseline sits at `baseline`.
    pub fn from_baseline(x: f32, baseline: f32, width: f32, height: f32) -> Self {
        Self::new(x, baseline - height, width, height)
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = self.right().max(other.right());
        let max_y = self.bottom().max(other.bottom());
        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Check whether `other` lies inside this box (with a small tolerance
    /// for float accumulation).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// A positioned text fragment in viewport space, as produced by the PDF
/// content-extraction boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Rendered width
    pub width: f32,
    /// Estimated glyph height
    pub height: f32,
}

impl TextRun {
    /// Create a new text run.
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// Bounding box of the run.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_baseline(self.x, self.y, self.width, self.height)
    }

    /// Average character width, assuming uniform glyph widths within the run.
    pub fn char_width(&self) -> f32 {
        let len = self.text.chars().count();
        if len > 0 {
            self.width / len as f32
        } else {
            0.0
        }
    }
}

/// A raw text item as delivered by a PDF text-content extractor: the item's
/// own text matrix plus its unscaled advance width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTextItem {
    /// The text content
    pub text: String,
    /// Text-space transform of the item
    pub transform: Matrix,
    /// Advance width in text space
    #[serde(default)]
    pub width: f32,
    /// Item height in text space (fallback when the matrix carries no scale)
    #[serde(default)]
    pub height: f32,
}

/// Page-to-viewport mapping used when the text layer is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Rendering scale
    pub scale: f32,
    /// Page-to-viewport transform
    pub transform: Matrix,
}

impl Viewport {
    /// Create a viewport from an explicit transform.
    pub fn new(scale: f32, transform: Matrix) -> Self {
        Self { scale, transform }
    }

    /// Standard unrotated viewport for a page of the given size in points:
    /// flips the y axis so that y grows downward.
    pub fn for_page(height: f32, scale: f32) -> Self {
        Self::new(scale, [scale, 0.0, 0.0, -scale, 0.0, height * scale])
    }

    /// Map a raw item into a viewport-space run.
    ///
    /// Returns `None` for items without text.
    pub fn to_run(&self, item: &RawTextItem) -> Option<TextRun> {
        if item.text.is_empty() {
            return None;
        }
        let tx = multiply(&self.transform, &item.transform);
        let height = [tx[3].abs(), item.height]
            .into_iter()
            .find(|h| *h > 0.0)
            .unwrap_or(10.0);
        let width = item.width * self.scale;
        Some(TextRun::new(item.text.clone(), tx[4], tx[5], width, height))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0, IDENTITY)
    }
}

/// Approximate placement of one whitespace-delimited token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPosition {
    /// Token text
    pub token: String,
    /// Left edge
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}
