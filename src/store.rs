//! Page and paragraph state shared by the orchestrators and the renderers.
//!
//! Every mutation is a partial update keyed by page number and paragraph
//! id. Subscribers receive a [`StoreEvent`] per change over a crossbeam
//! channel, which is how a UI layer learns what to re-render.

use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::model::{Document, LoadState, Page, Paragraph, ParagraphPatch};

/// Change notification emitted by [`DocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The full page set was replaced
    PagesReplaced,
    /// One paragraph changed
    ParagraphUpdated {
        /// Page holding the paragraph
        page_number: u32,
        /// Paragraph id
        paragraph_id: String,
    },
    /// Load state changed
    LoadStateChanged(LoadState),
    /// Global translating flag changed
    TranslatingChanged(bool),
    /// All annotation fields were reset
    AnnotationsReset,
}

/// State interface the orchestrators read from and write to.
///
/// Reads return snapshots; writers never hold references into the store
/// across a service call.
pub trait ParagraphStore: Send + Sync {
    /// Snapshot of one page.
    fn page(&self, page_number: u32) -> Option<Page>;

    /// Numbers of all loaded pages.
    fn page_numbers(&self) -> Vec<u32>;

    /// Snapshot of one paragraph.
    fn paragraph(&self, page_number: u32, paragraph_id: &str) -> Option<Paragraph>;

    /// Apply a partial update; returns `false` when the paragraph is unknown.
    fn update_paragraph(&self, page_number: u32, paragraph_id: &str, patch: ParagraphPatch)
        -> bool;

    /// Replace the load state.
    fn set_load_state(&self, state: LoadState);

    /// Set the global translating flag.
    fn set_translating(&self, translating: bool);
}

#[derive(Debug, Default)]
struct StoreState {
    document: Document,
    load_state: LoadState,
    translating: bool,
}

/// In-memory [`ParagraphStore`].
#[derive(Debug, Default)]
pub struct DocumentStore {
    state: RwLock<StoreState>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all pages and mark the document ready.
    pub fn set_pages(&self, pages: Vec<Page>) {
        {
            let mut state = self.write();
            state.document = Document::from_pages(pages);
            state.load_state = LoadState::Ready;
        }
        self.emit(StoreEvent::PagesReplaced);
        self.emit(StoreEvent::LoadStateChanged(LoadState::Ready));
    }

    /// Snapshot of the whole document.
    pub fn document(&self) -> Document {
        self.read().document.clone()
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        self.read().load_state.clone()
    }

    /// Whether a translate-all run is in progress.
    pub fn is_translating(&self) -> bool {
        self.read().translating
    }

    /// Return every paragraph's annotation fields to their initial state.
    pub fn reset_annotations(&self) {
        {
            let mut state = self.write();
            for page in &mut state.document.pages {
                for paragraph in &mut page.paragraphs {
                    paragraph.reset_annotations();
                }
            }
            state.translating = false;
        }
        self.emit(StoreEvent::AnnotationsReset);
    }

    /// Subscribe to change events.
    ///
    /// Dropping the receiver unsubscribes on the next emitted event.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    fn emit(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ParagraphStore for DocumentStore {
    fn page(&self, page_number: u32) -> Option<Page> {
        self.read().document.get_page(page_number).cloned()
    }

    fn page_numbers(&self) -> Vec<u32> {
        self.read().document.pages.iter().map(|p| p.number).collect()
    }

    fn paragraph(&self, page_number: u32, paragraph_id: &str) -> Option<Paragraph> {
        self.read()
            .document
            .get_page(page_number)
            .and_then(|page| page.paragraph(paragraph_id))
            .cloned()
    }

    fn update_paragraph(
        &self,
        page_number: u32,
        paragraph_id: &str,
        patch: ParagraphPatch,
    ) -> bool {
        let updated = {
            let mut state = self.write();
            match state
                .document
                .get_page_mut(page_number)
                .and_then(|page| page.paragraph_mut(paragraph_id))
            {
                Some(paragraph) => {
                    paragraph.apply(&patch);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.emit(StoreEvent::ParagraphUpdated {
                page_number,
                paragraph_id: paragraph_id.to_string(),
            });
        } else {
            log::warn!(
                "update for unknown paragraph {} on page {}",
                paragraph_id,
                page_number
            );
        }
        updated
    }

    fn set_load_state(&self, load_state: LoadState) {
        self.write().load_state = load_state.clone();
        self.emit(StoreEvent::LoadStateChanged(load_state));
    }

    fn set_translating(&self, translating: bool) {
        self.write().translating = translating;
        self.emit(StoreEvent::TranslatingChanged(translating));
    }
}
