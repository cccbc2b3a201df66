//! End-to-end tests of translation and span annotation against a scripted
//! language service.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use pdflingo::error::{Error, Result};
use pdflingo::{
    AnnotationSession, AnnotatorOptions, BoundingBox, LanguageService, LoadState, Page, Paragraph,
    ServiceConfig, ServiceProvider, Span, SpanDetection, SpanRole, SpanStatus, StoreEvent,
    TranslationStatus,
};

#[derive(Default)]
struct ScriptedService {
    translations: HashMap<String, String>,
    failures: HashMap<String, String>,
    brackets: HashMap<String, String>,
    span_failures: HashMap<String, String>,
    malformed_spans: HashSet<String>,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<String>>,
    span_calls: AtomicUsize,
}

impl ScriptedService {
    fn translating(mut self, source: &str, translation: &str) -> Self {
        self.translations
            .insert(source.to_string(), translation.to_string());
        self
    }

    fn failing(mut self, source: &str, message: &str) -> Self {
        self.failures.insert(source.to_string(), message.to_string());
        self
    }

    fn bracketing(mut self, source: &str, bracket: &str) -> Self {
        self.brackets.insert(source.to_string(), bracket.to_string());
        self
    }

    fn failing_spans(mut self, source: &str, message: &str) -> Self {
        self.span_failures
            .insert(source.to_string(), message.to_string());
        self
    }

    fn malformed_spans(mut self, source: &str) -> Self {
        self.malformed_spans.insert(source.to_string());
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageService for ScriptedService {
    async fn translate(&self, text: &str) -> Result<String> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = self.failures.get(text) {
            return Err(Error::Service(message.clone()));
        }
        Ok(self
            .translations
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[ja] {}", text)))
    }

    async fn detect_spans(&self, text: &str) -> Result<SpanDetection> {
        self.span_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.span_failures.get(text) {
            return Err(Error::Service(message.clone()));
        }
        if self.malformed_spans.contains(text) {
            return SpanDetection::parse("{\"tokens\": [\"unterminated");
        }
        Ok(SpanDetection {
            tokens: text.split_whitespace().map(str::to_string).collect(),
            bracket: self.brackets.get(text).cloned().unwrap_or_default(),
        })
    }
}

fn paragraph(id: &str, text: &str) -> Paragraph {
    Paragraph::new(id, text, BoundingBox::new(40.0, 100.0, 200.0, 24.0)).with_line_count(2)
}

fn session_with(
    service: &Arc<ScriptedService>,
    config: ServiceConfig,
    pages: Vec<Page>,
) -> AnnotationSession {
    let session = AnnotationSession::with_provider(
        ServiceProvider::fixed(Arc::clone(service) as Arc<dyn LanguageService>),
        config,
        AnnotatorOptions::default(),
    );
    session.load_pages(pages);
    session
}

fn session(service: &Arc<ScriptedService>, pages: Vec<Page>) -> AnnotationSession {
    session_with(service, ServiceConfig::new("test-key"), pages)
}

fn find(session: &AnnotationSession, page: u32, id: &str) -> Paragraph {
    session
        .document()
        .get_page(page)
        .and_then(|p| p.paragraph(id).cloned())
        .unwrap()
}

#[tokio::test]
async fn test_translates_eligible_paragraphs() {
    let service = Arc::new(ScriptedService::default().translating("A. B. C. D.", "甲。乙。丙。丁。"));
    let short = Paragraph::new("1-2", "Heading", BoundingBox::default());
    let mut formula = paragraph("1-3", "x = y + 1");
    formula.is_math_like = true;
    let session = session(
        &service,
        vec![Page::new(1, vec![paragraph("1-1", "A. B. C. D."), short, formula])],
    );

    session.controller().translate_page(1).await;

    let translated = find(&session, 1, "1-1");
    assert_eq!(translated.status, TranslationStatus::Done);
    assert_eq!(translated.translation, "甲。乙。丙。丁。");
    assert_eq!(find(&session, 1, "1-2").status, TranslationStatus::Idle);
    assert_eq!(find(&session, 1, "1-3").status, TranslationStatus::Idle);
    assert_eq!(service.calls(), vec!["A. B. C. D."]);

    // Settled paragraphs are not requested again.
    session.controller().translate_page(1).await;
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_merge_group_translated_once_and_split() {
    let service = Arc::new(
        ScriptedService::default().translating("first half second half", "最初の文。次の文。"),
    );
    let pages = vec![Page::new(
        1,
        vec![
            paragraph("1-1", "first half").with_merge("1-merge-0", 0),
            paragraph("1-2", "second half").with_merge("1-merge-0", 1),
        ],
    )];
    let session = session(&service, pages);

    session.controller().translate_page(1).await;

    assert_eq!(service.calls(), vec!["first half second half"]);
    let first = find(&session, 1, "1-1");
    let second = find(&session, 1, "1-2");
    assert_eq!(first.status, TranslationStatus::Done);
    assert_eq!(first.translation, "最初の文。");
    assert_eq!(second.status, TranslationStatus::Done);
    assert_eq!(second.translation, "次の文。");
}

#[tokio::test]
async fn test_merge_member_translated_alone_when_partner_ineligible() {
    let service = Arc::new(ScriptedService::default());
    let pages = vec![Page::new(
        1,
        vec![
            Paragraph::new("1-1", "Results", BoundingBox::new(40.0, 100.0, 200.0, 12.0))
                .with_line_count(1)
                .with_merge("1-merge-0", 0),
            paragraph("1-2", "continue in the next column of the page.")
                .with_line_count(4)
                .with_merge("1-merge-0", 1),
        ],
    )];
    let session = session(&service, pages);

    session.controller().translate_page(1).await;

    assert_eq!(service.calls(), vec!["continue in the next column of the page."]);
    let second = find(&session, 1, "1-2");
    assert_eq!(second.status, TranslationStatus::Done);
    assert_eq!(second.translation, "[ja] continue in the next column of the page.");
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Idle);

    // A second pass does not request it again.
    session.controller().translate_page(1).await;
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_skipped_paragraph_is_not_translated() {
    let service = Arc::new(ScriptedService::default());
    let mut skipped = paragraph("1-1", "Left out by the reader.");
    skipped.status = TranslationStatus::Skipped;
    let session = session(&service, vec![Page::new(1, vec![skipped])]);

    session.controller().translate_page(1).await;

    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Skipped);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_merge_group_failure_marks_both() {
    let service = Arc::new(ScriptedService::default().failing("X Y", "server overloaded"));
    let pages = vec![Page::new(
        1,
        vec![
            paragraph("1-1", "X").with_merge("1-merge-0", 0),
            paragraph("1-2", "Y").with_merge("1-merge-0", 1),
        ],
    )];
    let session = session(&service, pages);

    session.controller().translate_page(1).await;

    for id in ["1-1", "1-2"] {
        let p = find(&session, 1, id);
        assert_eq!(p.status, TranslationStatus::Error);
        assert_eq!(p.error.as_deref(), Some("server overloaded"));
    }
}

#[tokio::test]
async fn test_empty_text_gets_placeholder_without_request() {
    let service = Arc::new(ScriptedService::default());
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", "   ")])]);

    session
        .controller()
        .translate_paragraph(1, "1-1")
        .await
        .unwrap();

    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Done);
    assert_eq!(p.translation, AnnotatorOptions::default().empty_text_placeholder);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_missing_credential_reported_once() {
    let service = Arc::new(ScriptedService::default());
    let session = session_with(
        &service,
        ServiceConfig::default(),
        vec![Page::new(
            1,
            vec![paragraph("1-1", "One two."), paragraph("1-2", "Three four.")],
        )],
    );
    let events = session.store().subscribe();

    session.controller().translate_page(1).await;
    session.controller().translate_page(1).await;

    let errors = events
        .try_iter()
        .filter(|e| matches!(e, StoreEvent::LoadStateChanged(LoadState::Error { .. })))
        .count();
    assert_eq!(errors, 1);
    assert!(session.store().load_state().is_error());
    assert!(service.calls().is_empty());
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Idle);

    let err = session
        .controller()
        .translate_paragraph(1, "1-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingCredential));

    session.set_service_config(ServiceConfig::new("now-set"));
    assert_eq!(session.store().load_state(), LoadState::Ready);

    session.controller().translate_page(1).await;
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Done);
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn test_service_error_recorded_on_paragraph() {
    let service = Arc::new(ScriptedService::default().failing("Bad input here.", "rate limit exceeded"));
    let session = session(
        &service,
        vec![Page::new(
            1,
            vec![paragraph("1-1", "Bad input here."), paragraph("1-2", "Good input here.")],
        )],
    );

    let err = session
        .controller()
        .translate_paragraph(1, "1-1")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "rate limit exceeded");

    session.controller().translate_page(1).await;

    let failed = find(&session, 1, "1-1");
    assert_eq!(failed.status, TranslationStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("rate limit exceeded"));
    assert_eq!(find(&session, 1, "1-2").status, TranslationStatus::Done);
    // Failed paragraphs are not retried automatically.
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn test_unknown_paragraph_is_an_error() {
    let service = Arc::new(ScriptedService::default());
    let session = session(&service, vec![Page::new(1, vec![])]);

    let err = session
        .controller()
        .translate_paragraph(1, "1-9")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ParagraphNotFound(1, _)));
}

#[tokio::test]
async fn test_span_detection_after_translation() {
    let text = "We measured the latency carefully";
    let service = Arc::new(
        ScriptedService::default().bracketing(text, "We measured (O the latency ) carefully"),
    );
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", text)])]);
    session.set_span_detection(true);

    session.controller().translate_page(1).await;
    session.flush().await;

    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Done);
    assert_eq!(p.span_status, SpanStatus::Done);
    let targets = p.span_targets.unwrap();
    assert_eq!(targets.targets, vec![Span::new(SpanRole::O, 2, 3)]);
    assert_eq!(targets.tokens.len(), 5);
    assert_eq!(service.span_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_span_failure_recorded_without_touching_translation() {
    let service = Arc::new(
        ScriptedService::default()
            .failing_spans("Spans fail for this one", "span model unavailable")
            .malformed_spans("Spans come back garbled"),
    );
    let session = session(
        &service,
        vec![Page::new(
            1,
            vec![
                paragraph("1-1", "Spans fail for this one"),
                paragraph("1-2", "Spans come back garbled"),
                paragraph("1-3", "Spans work for this one"),
            ],
        )],
    );
    session.set_span_detection(true);

    session.controller().translate_page(1).await;
    session.flush().await;

    let failed = find(&session, 1, "1-1");
    assert_eq!(failed.status, TranslationStatus::Done);
    assert_eq!(failed.translation, "[ja] Spans fail for this one");
    assert_eq!(failed.span_status, SpanStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("span model unavailable"));
    assert!(failed.span_targets.is_none());

    let garbled = find(&session, 1, "1-2");
    assert_eq!(garbled.status, TranslationStatus::Done);
    assert_eq!(garbled.span_status, SpanStatus::Error);
    assert!(garbled.error.as_deref().unwrap().starts_with("JSON error"));

    let fine = find(&session, 1, "1-3");
    assert_eq!(fine.span_status, SpanStatus::Done);
    assert!(fine.error.is_none());
    assert_eq!(service.span_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_span_request_scheduled_before_disable_is_dropped() {
    let service = Arc::new(ScriptedService::default());
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", "Some text here")])]);
    session.set_span_detection(true);

    session.controller().translate_page(1).await;
    session.set_enabled(false);
    session.flush().await;

    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Idle);
    assert_eq!(p.span_status, SpanStatus::Idle);
    assert!(p.span_targets.is_none());

    // Requests scheduled after re-enabling run normally.
    session.set_enabled(true);
    session.controller().translate_page(1).await;
    session.flush().await;
    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Done);
    assert_eq!(p.span_status, SpanStatus::Done);
}

#[tokio::test]
async fn test_span_detection_off_by_default() {
    let service = Arc::new(ScriptedService::default());
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", "Some text here")])]);

    session.controller().translate_page(1).await;
    session.flush().await;

    assert_eq!(find(&session, 1, "1-1").span_status, SpanStatus::Idle);
    assert_eq!(service.span_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_page_visible_prefetches_next_page() {
    let service = Arc::new(ScriptedService::default());
    let session = session(
        &service,
        vec![
            Page::new(1, vec![paragraph("1-1", "Page one text.")]),
            Page::new(2, vec![paragraph("2-1", "Page two text.")]),
            Page::new(3, vec![paragraph("3-1", "Page three text.")]),
        ],
    );

    assert!(session.handle_page_visible(1));
    assert!(!session.handle_page_visible(1));
    assert!(!session.handle_page_visible(42));
    session.flush().await;

    assert_eq!(session.current_page(), 1);
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Done);
    assert_eq!(find(&session, 2, "2-1").status, TranslationStatus::Done);
    assert_eq!(find(&session, 3, "3-1").status, TranslationStatus::Idle);
    assert_eq!(session.controller().visible_pages(), vec![1]);
}

#[tokio::test]
async fn test_translate_all_covers_visible_pages() {
    let service = Arc::new(ScriptedService::default());
    let session = session(
        &service,
        vec![
            Page::new(1, vec![paragraph("1-1", "Page one text.")]),
            Page::new(2, vec![paragraph("2-1", "Page two text.")]),
        ],
    );
    let events = session.store().subscribe();

    session.controller().mark_page_visible(2);
    session.translate_all().await;

    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Idle);
    assert_eq!(find(&session, 2, "2-1").status, TranslationStatus::Done);
    assert!(!session.store().is_translating());

    let flags: Vec<bool> = events
        .try_iter()
        .filter_map(|e| match e {
            StoreEvent::TranslatingChanged(flag) => Some(flag),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_disable_resets_everything() {
    let service = Arc::new(ScriptedService::default());
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", "Some text here")])]);

    session.controller().mark_page_visible(1);
    session.translate_all().await;
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Done);

    session.set_enabled(false);
    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Idle);
    assert!(p.translation.is_empty());
    assert!(session.controller().visible_pages().is_empty());

    session.controller().translate_page(1).await;
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Idle);
    assert!(!session.handle_page_visible(1));

    session.set_enabled(true);
    session.controller().translate_page(1).await;
    assert_eq!(find(&session, 1, "1-1").status, TranslationStatus::Done);
    assert_eq!(service.calls().len(), 2);
}

#[tokio::test]
async fn test_result_after_disable_is_discarded() {
    let gate = Arc::new(Notify::new());
    let service = Arc::new(ScriptedService::default().gated(Arc::clone(&gate)));
    let session = session(&service, vec![Page::new(1, vec![paragraph("1-1", "Slow text here")])]);

    let controller = session.controller().clone();
    let running = tokio::spawn(async move { controller.translate_page(1).await });
    while find(&session, 1, "1-1").status != TranslationStatus::Translating {
        tokio::task::yield_now().await;
    }

    session.set_enabled(false);
    gate.notify_one();
    running.await.unwrap();

    let p = find(&session, 1, "1-1");
    assert_eq!(p.status, TranslationStatus::Idle);
    assert!(p.translation.is_empty());
}
