//! One document session: store, layout and translation wired together.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::layout::{build_document, LayoutOptions, PageInput};
use crate::model::{Document, LoadState, Page};
use crate::service::{ServiceConfig, ServiceProvider};
use crate::store::{DocumentStore, ParagraphStore};
use crate::translate::{AnnotatorOptions, TranslationController};

/// Owns the state of one loaded document and the controller driving it.
///
/// Dropping the session drops its scheduling state; nothing leaks into
/// the next document.
pub struct AnnotationSession {
    store: Arc<DocumentStore>,
    controller: TranslationController,
    current_page: AtomicU32,
}

impl AnnotationSession {
    /// Create a session backed by the OpenAI client.
    pub fn new(config: ServiceConfig, options: AnnotatorOptions) -> Self {
        Self::with_provider(ServiceProvider::openai(), config, options)
    }

    /// Create a session with a custom service provider.
    pub fn with_provider(
        provider: ServiceProvider,
        config: ServiceConfig,
        options: AnnotatorOptions,
    ) -> Self {
        let store = Arc::new(DocumentStore::new());
        let controller = TranslationController::new(
            Arc::clone(&store) as Arc<dyn ParagraphStore>,
            provider,
            config,
            options,
        );
        Self {
            store,
            controller,
            current_page: AtomicU32::new(0),
        }
    }

    /// The state store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// The translation controller.
    pub fn controller(&self) -> &TranslationController {
        &self.controller
    }

    /// Lay out raw pages and load them.
    pub fn load_document(&self, pages: &[PageInput], options: &LayoutOptions) -> Document {
        self.store.set_load_state(LoadState::Loading);
        self.current_page.store(0, Ordering::Relaxed);

        let document = build_document(pages, options);
        log::info!(
            "loaded {} pages with {} paragraphs",
            document.page_count(),
            document.paragraph_count()
        );
        self.store.set_pages(document.pages.clone());
        document
    }

    /// Load already laid-out pages.
    pub fn load_pages(&self, pages: Vec<Page>) {
        self.current_page.store(0, Ordering::Relaxed);
        self.store.set_pages(pages);
    }

    /// Handle a page entering the viewport.
    ///
    /// Unknown pages are ignored. Must be called within a tokio runtime.
    pub fn handle_page_visible(&self, page_number: u32) -> bool {
        if self.store.page(page_number).is_none() {
            return false;
        }
        self.current_page.store(page_number, Ordering::Relaxed);
        self.controller.handle_page_visible(page_number)
    }

    /// Page most recently reported visible (0 before any).
    pub fn current_page(&self) -> u32 {
        self.current_page.load(Ordering::Relaxed)
    }

    /// Translate every visible page and wait for completion.
    pub async fn translate_all(&self) {
        self.controller.handle_translate_all().await;
    }

    /// Toggle translation. Disabling also resets every paragraph's
    /// annotation fields so a later enable starts from scratch.
    pub fn set_enabled(&self, enabled: bool) {
        self.controller.set_enabled(enabled);
        if !enabled {
            self.store.reset_annotations();
        }
    }

    /// Toggle span detection for later translations.
    pub fn set_span_detection(&self, enabled: bool) {
        self.controller.set_span_detection(enabled);
    }

    /// Replace the service configuration.
    pub fn set_service_config(&self, config: ServiceConfig) {
        self.controller.set_service_config(config);
    }

    /// Wait for background translation and annotation work.
    pub async fn flush(&self) {
        self.controller.flush().await;
    }

    /// Snapshot of the document.
    pub fn document(&self) -> Document {
        self.store.document()
    }
}
