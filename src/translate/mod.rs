//! Translation orchestration.
//!
//! [`TranslationController`] decides which paragraphs to translate when a
//! page becomes visible, submits them through a bounded [`TaskQueue`],
//! translates column-split paragraphs as one request, and hands
//! successful paragraphs to the [`SpanAnnotator`] when span detection is
//! on.
//!
//! Scheduling state (visible pages, in-flight ids) belongs to one
//! controller and therefore to one document session. Disabling the
//! controller bumps an epoch; results of requests started under an older
//! epoch are dropped instead of written.

mod options;
mod split;

pub use options::AnnotatorOptions;
pub use split::split_by_ratio;

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::annotate::SpanAnnotator;
use crate::error::{Error, Result};
use crate::model::{LoadState, Paragraph, ParagraphPatch, TranslationStatus};
use crate::queue::TaskQueue;
use crate::service::{LanguageService, ServiceConfig, ServiceProvider};
use crate::store::ParagraphStore;

#[derive(Debug)]
struct ControllerState {
    enabled: bool,
    span_detection: bool,
    epoch: u64,
    visible_pages: BTreeSet<u32>,
    in_flight: HashSet<String>,
    credential_reported: bool,
}

struct Inner {
    store: Arc<dyn ParagraphStore>,
    provider: ServiceProvider,
    config: RwLock<ServiceConfig>,
    options: AnnotatorOptions,
    queue: TaskQueue,
    annotator: Arc<SpanAnnotator>,
    state: Mutex<ControllerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Schedules paragraph translation and span annotation for one document.
///
/// Cloning is cheap; clones drive the same controller.
#[derive(Clone)]
pub struct TranslationController {
    inner: Arc<Inner>,
}

impl TranslationController {
    /// Create an enabled controller writing into `store`.
    pub fn new(
        store: Arc<dyn ParagraphStore>,
        provider: ServiceProvider,
        config: ServiceConfig,
        options: AnnotatorOptions,
    ) -> Self {
        let annotator = Arc::new(SpanAnnotator::new(Arc::clone(&store), &options));
        Self {
            inner: Arc::new(Inner {
                store,
                provider,
                config: RwLock::new(config),
                queue: TaskQueue::new(options.translation_concurrency),
                options,
                annotator,
                state: Mutex::new(ControllerState {
                    enabled: true,
                    span_detection: false,
                    epoch: 0,
                    visible_pages: BTreeSet::new(),
                    in_flight: HashSet::new(),
                    credential_reported: false,
                }),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether translation is enabled.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Enable or disable translation.
    ///
    /// Disabling drops every queued request in both queues, forgets
    /// visible pages and in-flight ids, and invalidates running requests.
    /// Paragraph fields are left as they are; reset them through the store.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.enabled = enabled;
        if !enabled {
            self.inner.queue.clear();
            self.inner.annotator.reset();
            state.in_flight.clear();
            state.visible_pages.clear();
            state.credential_reported = false;
            state.epoch += 1;
            log::info!("translation disabled (epoch {})", state.epoch);
        }
    }

    /// Whether span detection follows successful translations.
    pub fn span_detection_enabled(&self) -> bool {
        self.lock().span_detection
    }

    /// Turn span detection on or off for later translations.
    pub fn set_span_detection(&self, enabled: bool) {
        self.lock().span_detection = enabled;
    }

    /// Current service configuration.
    pub fn service_config(&self) -> ServiceConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the service configuration.
    ///
    /// A previously reported missing-credential error is cleared once a
    /// credential is present.
    pub fn set_service_config(&self, config: ServiceConfig) {
        let has_credential = config.has_credential();
        *self.inner.config.write().unwrap_or_else(|e| e.into_inner()) = config;

        let mut state = self.lock();
        if state.credential_reported && has_credential {
            if !self.inner.store.page_numbers().is_empty() {
                self.inner.store.set_load_state(LoadState::Ready);
            }
            state.credential_reported = false;
        }
    }

    /// Pages marked visible so far, in ascending order.
    pub fn visible_pages(&self) -> Vec<u32> {
        self.lock().visible_pages.iter().copied().collect()
    }

    /// The translation queue, for diagnostics.
    pub fn queue(&self) -> &TaskQueue {
        &self.inner.queue
    }

    /// The span annotator.
    pub fn annotator(&self) -> &Arc<SpanAnnotator> {
        &self.inner.annotator
    }

    /// Record a page as visible without translating it.
    ///
    /// Returns `false` when the page was already visible or the controller
    /// is disabled.
    pub fn mark_page_visible(&self, page_number: u32) -> bool {
        let mut state = self.lock();
        state.enabled && state.visible_pages.insert(page_number)
    }

    /// Handle a page entering the viewport.
    ///
    /// The first call per page translates it, and the following page when
    /// prefetch is on, in the background. Later calls are no-ops. Returns
    /// whether work was scheduled. Must be called within a tokio runtime.
    pub fn handle_page_visible(&self, page_number: u32) -> bool {
        if !self.mark_page_visible(page_number) {
            return false;
        }
        log::debug!("page {} visible", page_number);

        let this = self.clone();
        self.spawn(async move {
            let current = this.translate_page(page_number);
            if this.inner.options.prefetch_next_page {
                let next = this.translate_page(page_number + 1);
                futures::join!(current, next);
            } else {
                current.await;
            }
        });
        true
    }

    /// Translate every visible page, waiting for all of them to settle.
    pub async fn handle_translate_all(&self) {
        if !self.is_enabled() {
            return;
        }
        self.inner.store.set_translating(true);
        let pages = self.visible_pages();
        log::info!("translating {} visible pages", pages.len());
        join_all(pages.into_iter().map(|n| self.translate_page(n))).await;
        self.inner.store.set_translating(false);
    }

    /// Translate every idle, eligible paragraph of a page.
    ///
    /// Paragraph failures are recorded on the paragraphs and do not stop
    /// their siblings. Unknown pages are ignored.
    pub async fn translate_page(&self, page_number: u32) {
        if !self.is_enabled() {
            return;
        }
        let Some(page) = self.inner.store.page(page_number) else {
            return;
        };
        let min_lines = self.inner.options.min_line_count;
        let ids: Vec<&str> = page
            .paragraphs
            .iter()
            .filter(|p| p.status == TranslationStatus::Idle && p.is_eligible(min_lines))
            .map(|p| p.id.as_str())
            .collect();
        if ids.is_empty() {
            return;
        }

        let results =
            join_all(ids.iter().map(|id| self.translate_paragraph(page_number, id))).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            log::warn!(
                "page {}: {} of {} paragraphs failed",
                page_number,
                failed,
                ids.len()
            );
        } else {
            log::debug!("page {}: {} paragraphs settled", page_number, ids.len());
        }
    }

    /// Translate one paragraph.
    ///
    /// Returns `Ok(())` when the paragraph was translated, skipped, or
    /// handled by its merge-group partner, and the error when the request
    /// failed or no credential is configured.
    pub async fn translate_paragraph(&self, page_number: u32, paragraph_id: &str) -> Result<()> {
        let paragraph = self
            .inner
            .store
            .paragraph(page_number, paragraph_id)
            .ok_or_else(|| Error::ParagraphNotFound(page_number, paragraph_id.to_string()))?;

        let Some(epoch) = self.admit(&paragraph) else {
            return Ok(());
        };

        let config = self.service_config();
        if !config.has_credential() {
            self.report_missing_credential();
            return Err(Error::MissingCredential);
        }

        if !paragraph.has_text() {
            self.write(
                epoch,
                page_number,
                &paragraph.id,
                ParagraphPatch::new()
                    .status(TranslationStatus::Done)
                    .translation(self.inner.options.empty_text_placeholder.clone()),
            );
            return Ok(());
        }

        let service = self.inner.provider.get(&config)?;
        if paragraph.merge.is_some() {
            self.translate_merge_group(epoch, page_number, &paragraph, service)
                .await
        } else {
            self.translate_single(epoch, page_number, &paragraph, service)
                .await
        }
    }

    /// Wait for every background task spawned so far, including span
    /// annotations started by those tasks.
    pub async fn flush(&self) {
        loop {
            let handles = self.take_background();
            if handles.is_empty() {
                break;
            }
            for result in join_all(handles).await {
                if let Err(e) = result {
                    log::warn!("background task failed: {}", e);
                }
            }
        }
    }

    async fn translate_single(
        &self,
        epoch: u64,
        page_number: u32,
        paragraph: &Paragraph,
        service: Arc<dyn LanguageService>,
    ) -> Result<()> {
        let Some(_claim) = self.claim(epoch, &[paragraph.id.as_str()]) else {
            return Ok(());
        };

        let task = async {
            self.write(
                epoch,
                page_number,
                &paragraph.id,
                ParagraphPatch::new().status(TranslationStatus::Translating),
            );
            service.translate(&paragraph.text).await
        };
        let Some(outcome) = self.inner.queue.enqueue(paragraph.id.clone(), task).await else {
            return Ok(());
        };

        match outcome {
            Ok(translation) => {
                self.write(
                    epoch,
                    page_number,
                    &paragraph.id,
                    ParagraphPatch::new()
                        .status(TranslationStatus::Done)
                        .translation(translation),
                );
                self.annotate(epoch, page_number, &[paragraph.id.as_str()], &service);
                Ok(())
            }
            Err(e) => {
                log::warn!("translation failed for {}: {}", paragraph.id, e);
                self.write(
                    epoch,
                    page_number,
                    &paragraph.id,
                    ParagraphPatch::new()
                        .status(TranslationStatus::Error)
                        .error(e.to_string()),
                );
                Err(e)
            }
        }
    }

    async fn translate_merge_group(
        &self,
        epoch: u64,
        page_number: u32,
        paragraph: &Paragraph,
        service: Arc<dyn LanguageService>,
    ) -> Result<()> {
        let page = self
            .inner
            .store
            .page(page_number)
            .ok_or(Error::PageNotFound(page_number))?;
        let group_id = paragraph.merge_group().unwrap_or_default();
        let group: Vec<Paragraph> = page.merge_group(group_id).into_iter().cloned().collect();

        let [first, second] = group.as_slice() else {
            log::warn!(
                "merge group {} has {} members; translating {} alone",
                group_id,
                group.len(),
                paragraph.id
            );
            return self
                .translate_single(epoch, page_number, paragraph, service)
                .await;
        };

        let min_lines = self.inner.options.min_line_count;
        if !first.is_eligible(min_lines) || !second.is_eligible(min_lines) {
            log::debug!(
                "merge group {}: partner not eligible; translating {} alone",
                group_id,
                paragraph.id
            );
            return self
                .translate_single(epoch, page_number, paragraph, service)
                .await;
        }

        // The partner at index 0 drives the whole group, unless it already
        // settled without this half.
        if paragraph.merge_index() != Some(0) {
            if first.status.is_terminal() && second.status == TranslationStatus::Idle {
                return self
                    .translate_single(epoch, page_number, paragraph, service)
                    .await;
            }
            return Ok(());
        }
        if group
            .iter()
            .any(|p| p.status == TranslationStatus::Translating)
        {
            return Ok(());
        }
        let Some(_claim) = self.claim(epoch, &[first.id.as_str(), second.id.as_str()]) else {
            return Ok(());
        };

        let combined = format!("{} {}", first.text, second.text).trim().to_string();
        let task = async {
            for member in [first, second] {
                self.write(
                    epoch,
                    page_number,
                    &member.id,
                    ParagraphPatch::new().status(TranslationStatus::Translating),
                );
            }
            service.translate(&combined).await
        };
        let Some(outcome) = self.inner.queue.enqueue(first.id.clone(), task).await else {
            return Ok(());
        };

        match outcome {
            Ok(translation) => {
                let first_len = first.text.chars().count();
                let total = first_len + second.text.chars().count();
                let ratio = if total == 0 {
                    0.5
                } else {
                    first_len as f64 / total as f64
                };
                let (head, tail) = split_by_ratio(&translation, ratio);
                log::debug!(
                    "merge group {}: split translation at ratio {:.2}",
                    group_id,
                    ratio
                );
                for (member, part) in [(first, head), (second, tail)] {
                    self.write(
                        epoch,
                        page_number,
                        &member.id,
                        ParagraphPatch::new()
                            .status(TranslationStatus::Done)
                            .translation(part),
                    );
                }
                self.annotate(
                    epoch,
                    page_number,
                    &[first.id.as_str(), second.id.as_str()],
                    &service,
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("translation failed for merge group {}: {}", group_id, e);
                let message = e.to_string();
                for member in [first, second] {
                    self.write(
                        epoch,
                        page_number,
                        &member.id,
                        ParagraphPatch::new()
                            .status(TranslationStatus::Error)
                            .error(message.clone()),
                    );
                }
                Err(e)
            }
        }
    }

    /// Start span detection for freshly translated paragraphs.
    fn annotate(
        &self,
        epoch: u64,
        page_number: u32,
        ids: &[&str],
        service: &Arc<dyn LanguageService>,
    ) {
        // Read under the controller lock: `set_enabled` resets the
        // annotator while holding it.
        let span_epoch = {
            let state = self.lock();
            if !state.span_detection || state.epoch != epoch {
                return;
            }
            self.inner.annotator.epoch()
        };
        for id in ids {
            let annotator = Arc::clone(&self.inner.annotator);
            let service = Arc::clone(service);
            let id = id.to_string();
            self.spawn(async move {
                if let Err(e) = annotator
                    .analyze_in(span_epoch, page_number, &id, service)
                    .await
                {
                    log::debug!("span detection for {} ended with error: {}", id, e);
                }
            });
        }
    }

    /// Check whether a paragraph may be submitted, returning the current
    /// epoch when it may.
    fn admit(&self, paragraph: &Paragraph) -> Option<u64> {
        let state = self.lock();
        if !state.enabled
            || paragraph.status != TranslationStatus::Idle
            || !paragraph.is_eligible(self.inner.options.min_line_count)
        {
            return None;
        }
        if state.in_flight.contains(&paragraph.id) || self.inner.queue.has(&paragraph.id) {
            log::trace!("paragraph {} already scheduled", paragraph.id);
            return None;
        }
        Some(state.epoch)
    }

    fn claim(&self, epoch: u64, ids: &[&str]) -> Option<InFlight<'_>> {
        let mut state = self.lock();
        if state.epoch != epoch || ids.iter().any(|id| state.in_flight.contains(*id)) {
            return None;
        }
        for id in ids {
            state.in_flight.insert(id.to_string());
        }
        Some(InFlight {
            controller: self,
            epoch,
            ids: ids.iter().map(|id| id.to_string()).collect(),
        })
    }

    fn report_missing_credential(&self) {
        let mut state = self.lock();
        if state.credential_reported {
            return;
        }
        state.credential_reported = true;
        log::error!("{}", Error::MissingCredential);
        self.inner.store.set_load_state(LoadState::Error {
            message: Error::MissingCredential.to_string(),
        });
    }

    /// Apply a patch unless the controller was reset since `epoch`.
    fn write(&self, epoch: u64, page_number: u32, paragraph_id: &str, patch: ParagraphPatch) {
        let state = self.lock();
        if state.epoch != epoch {
            log::debug!("discarding stale result for {}", paragraph_id);
            return;
        }
        self.inner
            .store
            .update_paragraph(page_number, paragraph_id, patch);
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    fn take_background(&self) -> Vec<JoinHandle<()>> {
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *background)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-flight registration of paragraph ids, removed on drop.
struct InFlight<'a> {
    controller: &'a TranslationController,
    epoch: u64,
    ids: Vec<String>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.lock();
        if state.epoch == self.epoch {
            for id in &self.ids {
                state.in_flight.remove(id);
            }
        }
    }
}
