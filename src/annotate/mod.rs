//! Object/complement span annotation of translated paragraphs.
//!
//! Requests run through their own [`TaskQueue`] so span detection never
//! competes with translation for slots.

mod align;

pub use align::{align_brackets, normalize, AlignOptions};

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::model::{ParagraphPatch, SpanStatus, SpanTargets};
use crate::queue::TaskQueue;
use crate::service::LanguageService;
use crate::store::ParagraphStore;
use crate::translate::AnnotatorOptions;

/// Runs span detection and stores aligned spans on paragraphs.
pub struct SpanAnnotator {
    store: Arc<dyn ParagraphStore>,
    queue: TaskQueue,
    align: AlignOptions,
    text_limit: usize,
    epoch: Mutex<u64>,
}

impl SpanAnnotator {
    /// Create an annotator writing into `store`.
    pub fn new(store: Arc<dyn ParagraphStore>, options: &AnnotatorOptions) -> Self {
        Self {
            store,
            queue: TaskQueue::new(options.span_concurrency),
            align: options.align.clone(),
            text_limit: options.span_text_limit,
            epoch: Mutex::new(0),
        }
    }

    /// Detect spans for one paragraph.
    ///
    /// Paragraphs whose span status is not idle, or that have no text, are
    /// left alone. A failed request is recorded on the paragraph and also
    /// returned.
    pub async fn analyze(
        &self,
        page_number: u32,
        paragraph_id: &str,
        service: Arc<dyn LanguageService>,
    ) -> Result<()> {
        self.analyze_in(self.epoch(), page_number, paragraph_id, service)
            .await
    }

    /// Detect spans on behalf of work scheduled in `epoch`.
    ///
    /// Does nothing once [`reset`](Self::reset) moved past `epoch`, so a
    /// request scheduled before a reset never lands afterwards.
    pub async fn analyze_in(
        &self,
        epoch: u64,
        page_number: u32,
        paragraph_id: &str,
        service: Arc<dyn LanguageService>,
    ) -> Result<()> {
        if self.epoch() != epoch {
            log::debug!("span request for {} outlived a reset", paragraph_id);
            return Ok(());
        }
        let paragraph = self
            .store
            .paragraph(page_number, paragraph_id)
            .ok_or_else(|| Error::ParagraphNotFound(page_number, paragraph_id.to_string()))?;
        if paragraph.span_status != SpanStatus::Idle || !paragraph.has_text() {
            return Ok(());
        }

        let task = async {
            self.write(
                epoch,
                page_number,
                paragraph_id,
                ParagraphPatch::new().span_status(SpanStatus::Processing),
            );

            let input = truncate_chars(&paragraph.text, self.text_limit);
            match service.detect_spans(&input).await {
                Ok(detection) => {
                    let targets =
                        align_brackets(&detection.bracket, &paragraph.tokens(), &self.align);
                    log::debug!(
                        "paragraph {}: {} spans aligned",
                        paragraph_id,
                        targets.len()
                    );
                    self.write(
                        epoch,
                        page_number,
                        paragraph_id,
                        ParagraphPatch::new()
                            .span_status(SpanStatus::Done)
                            .span_targets(SpanTargets {
                                tokens: detection.tokens,
                                bracket: detection.bracket,
                                targets,
                            }),
                    );
                    Ok(())
                }
                Err(e) => {
                    log::warn!("span detection failed for {}: {}", paragraph_id, e);
                    self.write(
                        epoch,
                        page_number,
                        paragraph_id,
                        ParagraphPatch::new()
                            .span_status(SpanStatus::Error)
                            .error(e.to_string()),
                    );
                    Err(e)
                }
            }
        };

        self.queue.enqueue(paragraph_id, task).await.unwrap_or(Ok(()))
    }

    /// Drop pending requests and ignore results of running ones.
    pub fn reset(&self) {
        self.queue.clear();
        *self.epoch.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    /// The annotator's queue, for diagnostics.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Current reset generation.
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self, epoch: u64, page_number: u32, paragraph_id: &str, patch: ParagraphPatch) {
        let current = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        if *current != epoch {
            log::debug!("discarding stale span result for {}", paragraph_id);
            return;
        }
        self.store.update_paragraph(page_number, paragraph_id, patch);
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
