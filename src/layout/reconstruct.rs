//! Paragraph reconstruction from positioned text runs.
//!
//! Runs are consumed in content-stream order. Each run either extends the
//! current paragraph or starts a new one, decided from the vertical gap to
//! the previous run, indentation of the new line, and jumps back up the
//! page (column breaks). A paragraph that wraps from the bottom of one
//! column to the top of the next without indentation is recorded as a
//! two-member merge group so it can be translated as one unit.

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{
    BoundingBox, Document, MergeLink, Page, Paragraph, RawTextItem, TextRun, TokenPosition,
    Viewport,
};

use super::{LayoutOptions, MathClassifier};

/// Incremental paragraph builder for one page.
pub struct ParagraphBuilder<'a> {
    options: &'a LayoutOptions,
    classifier: MathClassifier,
    token_regex: Regex,
    page_number: u32,
    paragraphs: Vec<Paragraph>,
    current: Option<Paragraph>,
    last_y: Option<f32>,
    last_height: f32,
    current_line_start_x: Option<f32>,
    previous_line_start_x: Option<f32>,
    avg_char_width: f32,
    avg_char_samples: u32,
    line_count: u32,
    merge_group_count: u32,
}

/// Line-level classification of one run against the running state.
#[derive(Debug, Clone, Copy)]
struct Breaks {
    line: bool,
    column: bool,
    indented: bool,
    paragraph: bool,
}

impl<'a> ParagraphBuilder<'a> {
    /// Create a builder for the given page.
    pub fn new(page_number: u32, options: &'a LayoutOptions) -> Self {
        Self {
            options,
            classifier: MathClassifier::new(options),
            token_regex: Regex::new(r"\S+").expect("valid token pattern"),
            page_number,
            paragraphs: Vec::new(),
            current: None,
            last_y: None,
            last_height: 0.0,
            current_line_start_x: None,
            previous_line_start_x: None,
            avg_char_width: 0.0,
            avg_char_samples: 0,
            line_count: 0,
            merge_group_count: 0,
        }
    }

    /// Feed the next run in stream order.
    pub fn push(&mut self, run: &TextRun) {
        if run.text.is_empty() {
            return;
        }

        let breaks = self.classify(run);

        if self.current.is_none() || breaks.paragraph {
            if let Some(done) = self.current.take() {
                self.paragraphs.push(done);
            }
            let mut paragraph = self.create_paragraph(run);
            self.append_tokens(&mut paragraph, run);
            self.line_count = 1;
            if breaks.column && !breaks.indented {
                self.mark_merge_group(&mut paragraph);
            }
            self.current = Some(paragraph);
        } else if let Some(mut paragraph) = self.current.take() {
            self.append_to_paragraph(&mut paragraph, run);
            self.append_tokens(&mut paragraph, run);
            self.current = Some(paragraph);
        }

        self.last_y = Some(run.y);
        self.last_height = run.height;
        self.update_avg_char_width(run);
    }

    /// Finish the page and return its paragraphs in reading order.
    pub fn finish(mut self) -> Vec<Paragraph> {
        if let Some(done) = self.current.take() {
            self.paragraphs.push(done);
        }
        log::debug!(
            "page {}: reconstructed {} paragraphs ({} merge groups)",
            self.page_number,
            self.paragraphs.len(),
            self.merge_group_count
        );
        self.paragraphs
    }

    fn classify(&mut self, run: &TextRun) -> Breaks {
        let threshold = self.options.line_threshold;
        let line = self.last_y.map_or(true, |last| (run.y - last).abs() > threshold);
        let column = self.last_y.is_some_and(|last| run.y < last - threshold);

        if line {
            self.previous_line_start_x = if column {
                None
            } else {
                self.current_line_start_x
            };
            self.current_line_start_x = Some(run.x);
            self.line_count = if self.current.is_some() {
                self.line_count + 1
            } else {
                1
            };
        } else if self.current_line_start_x.is_none() {
            self.current_line_start_x = Some(run.x);
        }

        let gap = self.last_y.map_or(0.0, |last| (run.y - last).abs());
        let indented = line && !column && self.is_indented();

        let reference = if self.last_height > 0.0 {
            self.last_height
        } else {
            run.height
        };
        let gap_threshold = run.height.max(reference) * self.options.paragraph_gap_ratio;
        let paragraph = gap > gap_threshold || indented || column;

        if column {
            log::debug!(
                "page {}: column break at y={:.1} (previous y={:.1})",
                self.page_number,
                run.y,
                self.last_y.unwrap_or_default()
            );
        }

        Breaks {
            line,
            column,
            indented,
            paragraph,
        }
    }

    fn is_indented(&self) -> bool {
        let threshold = self
            .options
            .indent_min
            .max(self.avg_char_width * self.options.indent_char_ratio);
        match (self.previous_line_start_x, self.current_line_start_x) {
            (Some(previous), Some(current)) => current - previous > threshold,
            _ => false,
        }
    }

    fn create_paragraph(&self, run: &TextRun) -> Paragraph {
        let id = format!("{}-{}", self.page_number, self.paragraphs.len() + 1);
        let mut paragraph = Paragraph::new(id, run.text.clone(), run.bbox());
        paragraph.is_math_like = self.classifier.is_math_like(&paragraph.text);
        paragraph
    }

    fn append_to_paragraph(&self, paragraph: &mut Paragraph, run: &TextRun) {
        paragraph.text = format!("{} {}", paragraph.text, run.text).trim().to_string();
        paragraph.bbox = paragraph.bbox.union(&run.bbox());
        paragraph.line_count = paragraph.line_count.max(self.line_count);
        paragraph.is_math_like = self.classifier.is_math_like(&paragraph.text);
    }

    fn append_tokens(&self, paragraph: &mut Paragraph, run: &TextRun) {
        if run.text.trim().is_empty() {
            return;
        }
        let char_width = run.char_width();
        for m in self.token_regex.find_iter(&run.text) {
            let offset = run.text[..m.start()].chars().count();
            let len = m.as_str().chars().count();
            paragraph.token_positions.push(TokenPosition {
                token: m.as_str().to_string(),
                x: run.x + offset as f32 * char_width,
                y: run.y,
                width: len as f32 * char_width,
                height: run.height,
            });
        }
    }

    /// Link the paragraph closed by a column break with the one opening the
    /// new column. A paragraph already in a group keeps its link so that a
    /// group never grows past two members.
    fn mark_merge_group(&mut self, next: &mut Paragraph) {
        let Some(previous) = self.paragraphs.last_mut() else {
            return;
        };
        if previous.merge.is_some() {
            return;
        }
        let group_id = format!("{}-merge-{}", self.page_number, self.merge_group_count);
        self.merge_group_count += 1;
        previous.merge = Some(MergeLink {
            group_id: group_id.clone(),
            index: 0,
        });
        next.merge = Some(MergeLink { group_id, index: 1 });
    }

    fn update_avg_char_width(&mut self, run: &TextRun) {
        if run.text.is_empty() {
            return;
        }
        let char_width = run.char_width();
        let samples = self.avg_char_samples as f32;
        self.avg_char_width = (self.avg_char_width * samples + char_width) / (samples + 1.0);
        self.avg_char_samples += 1;
    }
}

/// Reconstruct the paragraphs of one page from its runs.
///
/// Total over any input: an empty run list yields no paragraphs.
pub fn build_paragraphs(
    page_number: u32,
    runs: &[TextRun],
    options: &LayoutOptions,
) -> Vec<Paragraph> {
    let mut builder = ParagraphBuilder::new(page_number, options);
    for run in runs {
        builder.push(run);
    }
    builder.finish()
}

/// Text items of one page as delivered by the renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    /// Page number (1-indexed)
    pub number: u32,

    /// Viewport mapping text space to layout units
    #[serde(default)]
    pub viewport: Viewport,

    /// Raw text items in content-stream order
    pub items: Vec<RawTextItem>,
}

/// Lay out one page from raw text items.
pub fn build_page(
    page_number: u32,
    items: &[RawTextItem],
    viewport: &Viewport,
    options: &LayoutOptions,
) -> Page {
    let runs: Vec<TextRun> = items.iter().filter_map(|item| viewport.to_run(item)).collect();
    log::trace!(
        "page {}: {} of {} items produced runs",
        page_number,
        runs.len(),
        items.len()
    );
    Page::new(page_number, build_paragraphs(page_number, &runs, options))
}

/// Lay out every page of a document, in parallel when enabled.
///
/// Pages keep their input order regardless of scheduling.
pub fn build_document(pages: &[PageInput], options: &LayoutOptions) -> Document {
    let layout = |input: &PageInput| build_page(input.number, &input.items, &input.viewport, options);

    let pages: Vec<Page> = if options.parallel && pages.len() > 1 {
        pages.par_iter().map(layout).collect()
    } else {
        pages.iter().map(layout).collect()
    };

    log::debug!("laid out {} pages", pages.len());
    Document::from_pages(pages)
}

/// Bounding box union of a run list, used for diagnostics and tests.
pub fn runs_bbox(runs: &[TextRun]) -> Option<BoundingBox> {
    runs.iter()
        .map(TextRun::bbox)
        .reduce(|acc, b| acc.union(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        // 5 units per character, 10 units tall
        TextRun::new(text, x, y, text.chars().count() as f32 * 5.0, 10.0)
    }

    fn layout(runs: &[TextRun]) -> Vec<Paragraph> {
        build_paragraphs(1, runs, &LayoutOptions::default())
    }

    #[test]
    fn test_empty_input() {
        assert!(layout(&[]).is_empty());
    }

    #[test]
    fn test_single_run_matches_extents() {
        let r = run("Introduction to the method", 40.0, 100.0);
        let paragraphs = layout(std::slice::from_ref(&r));
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].bbox, r.bbox());
        assert_eq!(paragraphs[0].line_count, 1);
        assert!(!paragraphs[0].is_math_like);
        assert_eq!(paragraphs[0].id, "1-1");
    }

    #[test]
    fn test_lines_join_into_paragraph() {
        let runs = vec![
            run("The first line of text", 40.0, 100.0),
            run("continues on the second", 40.0, 112.0),
            run("and ends on the third.", 40.0, 124.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 1);
        let p = &paragraphs[0];
        assert_eq!(
            p.text,
            "The first line of text continues on the second and ends on the third."
        );
        assert_eq!(p.line_count, 3);
        for r in &runs {
            assert!(p.bbox.contains(&r.bbox()));
        }
    }

    #[test]
    fn test_same_line_runs_share_line() {
        let runs = vec![
            run("Hello", 40.0, 100.0),
            run("world", 70.0, 101.0),
            run("next line", 40.0, 112.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].line_count, 2);
        assert_eq!(paragraphs[0].text, "Hello world next line");
    }

    #[test]
    fn test_large_gap_breaks_paragraph() {
        let runs = vec![
            run("First paragraph line", 40.0, 100.0),
            run("Second paragraph line", 40.0, 130.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1].id, "1-2");
        assert!(paragraphs[0].merge.is_none());
    }

    #[test]
    fn test_indentation_breaks_paragraph() {
        let runs = vec![
            run("the end of a paragraph", 40.0, 100.0),
            run("that wraps once.", 40.0, 112.0),
            run("A new indented start", 60.0, 124.0),
            run("of another paragraph", 40.0, 136.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].line_count, 2);
        assert_eq!(paragraphs[1].text, "A new indented start of another paragraph");
        assert!(paragraphs[1].merge.is_none());
    }

    #[test]
    fn test_column_break_creates_merge_group() {
        let runs = vec![
            run("Prose at the bottom of", 40.0, 700.0),
            run("the first column keeps", 40.0, 712.0),
            run("going into the next", 320.0, 80.0),
            run("column without a break.", 320.0, 92.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 2);
        let first = paragraphs[0].merge.as_ref().unwrap();
        let second = paragraphs[1].merge.as_ref().unwrap();
        assert_eq!(first.group_id, second.group_id);
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(first.group_id, "1-merge-0");
    }

    #[test]
    fn test_merge_group_never_exceeds_two_members() {
        // Three columns of one continuous paragraph.
        let runs = vec![
            run("column one text", 40.0, 700.0),
            run("column one more", 40.0, 712.0),
            run("column two text", 240.0, 80.0),
            run("column two more", 240.0, 92.0),
            run("column three text", 440.0, 60.0),
            run("column three more", 440.0, 72.0),
        ];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 3);
        let mut groups = std::collections::HashMap::new();
        for p in &paragraphs {
            if let Some(link) = &p.merge {
                groups
                    .entry(link.group_id.clone())
                    .or_insert_with(Vec::new)
                    .push(link.index);
            }
        }
        for indices in groups.values() {
            let mut sorted = indices.clone();
            sorted.sort();
            assert_eq!(sorted, vec![0, 1]);
        }
    }

    #[test]
    fn test_token_positions() {
        let runs = vec![run("ab cde", 10.0, 50.0)];
        let paragraphs = layout(&runs);
        let tokens = &paragraphs[0].token_positions;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, "ab");
        assert!((tokens[0].x - 10.0).abs() < 1e-4);
        assert!((tokens[0].width - 10.0).abs() < 1e-4);
        assert_eq!(tokens[1].token, "cde");
        assert!((tokens[1].x - 25.0).abs() < 1e-4);
        assert!((tokens[1].width - 15.0).abs() < 1e-4);
        assert_eq!(tokens[1].y, 50.0);
    }

    #[test]
    fn test_math_paragraph_flagged() {
        let runs = vec![run("x = a + b", 40.0, 100.0), run("y = c × d", 40.0, 112.0)];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 1);
        assert!(paragraphs[0].is_math_like);
    }

    #[test]
    fn test_empty_runs_ignored() {
        let runs = vec![run("", 40.0, 10.0), run("Only text", 40.0, 100.0)];
        let paragraphs = layout(&runs);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].bbox, runs[1].bbox());
    }

    #[test]
    fn test_runs_bbox() {
        assert!(runs_bbox(&[]).is_none());
        let runs = vec![run("aa", 0.0, 10.0), run("bb", 20.0, 30.0)];
        assert_eq!(
            runs_bbox(&runs),
            Some(BoundingBox::new(0.0, 0.0, 30.0, 30.0))
        );
    }
}
