//! End-to-end behaviour of the extraction engine against simulated webmail
//! pages.
//!
//! All tests run on a paused tokio clock, so retry delays, debounce timers,
//! cache freshness and rescans are deterministic.

use async_trait::async_trait;
use mailsnap::{
    EmailSnapshot, EngineOptions, ExtractionEngine, ExtractionRequest, ExtractionResponse, Extractor,
    LiveDocument, Page, ProviderRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const NETEASE: &str = "https://mail.163.com/js6/main.jsp?sid=QA&df=mail163_letter";

const LONG_BODY: &str = "Hi Frank, the signed contract is attached. Please countersign \
                         and return it before Friday so legal can file it.";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn read_frame(text: &str) -> String {
    format!(r#"<html><body><div class="netease_mail_readhtml">{text}</div></body></html>"#)
}

/// Same frame after the client marks the message as rendered.
fn ready_frame(text: &str) -> String {
    read_frame(text).replace("<body>", r#"<body class="ready">"#)
}

/// Extractor that counts invocations and always finds the same subject.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

#[async_trait]
impl Extractor for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    async fn try_extract(&self, _page: &Page, _force: bool) -> mailsnap::Result<EmailSnapshot> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(EmailSnapshot {
            subject: format!("call {call}"),
            ..Default::default()
        })
    }
}

fn counting_engine() -> (ExtractionEngine, Arc<Counting>) {
    let counting = Arc::new(Counting::default());
    let mut registry = ProviderRegistry::new();
    registry
        .register(["mail.example.com"], counting.clone() as Arc<dyn Extractor>)
        .unwrap();
    let page = Page::new("https://mail.example.com/inbox/1", LiveDocument::new("<p></p>")).unwrap();
    let engine = ExtractionEngine::attach(Arc::new(page), registry, EngineOptions::default());
    (engine, counting)
}

#[tokio::test(start_paused = true)]
async fn fresh_cache_is_served_without_invoking_provider() {
    init_tracing();
    let (engine, counting) = counting_engine();

    let first = engine.email_snapshot(false).await;
    tokio::time::advance(Duration::from_millis(1500)).await;
    let second = engine.email_snapshot(false).await;

    assert_eq!(first, second);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_cache_reinvokes_provider() {
    let (engine, counting) = counting_engine();

    engine.email_snapshot(false).await;
    tokio::time::advance(Duration::from_millis(2000)).await;
    let refreshed = engine.email_snapshot(false).await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    assert_eq!(refreshed.subject, "call 2");
}

#[tokio::test(start_paused = true)]
async fn forced_request_bypasses_fresh_cache() {
    let (engine, counting) = counting_engine();

    engine.email_snapshot(false).await;
    let forced = engine.email_snapshot(true).await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    assert_eq!(forced.subject, "call 2");
    assert_eq!(engine.cached().await.unwrap().subject, "call 2");
}

#[tokio::test(start_paused = true)]
async fn forced_request_retries_until_frame_renders() {
    init_tracing();
    let frame = LiveDocument::new(read_frame(""));
    let page = Page::new(NETEASE, LiveDocument::new(r#"<iframe id="read"></iframe>"#)).unwrap();
    page.mount_frame("read", "/js6/read/readhtml.jsp", frame.clone()).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    let loader = frame.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        loader.replace(read_frame(LONG_BODY));
    });

    let start = Instant::now();
    let snapshot = engine.email_snapshot(true).await;

    assert_eq!(snapshot.body, LONG_BODY);
    // Second attempt succeeded; no further attempts were made.
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn cross_origin_and_short_frames_leave_body_empty() {
    let top = r#"
        <html><body>
            <div class="nui-subject">Status update</div>
            <span class="nui-addr-email">Grace &lt;grace@163.com&gt;</span>
            <iframe id="x" src="https://ads.partner.example/slot"></iframe>
            <iframe id="y"></iframe>
        </body></html>
    "#;
    let page = Page::new(NETEASE, LiveDocument::new(top)).unwrap();
    page.mount_frame("x", "https://ads.partner.example/slot", LiveDocument::new(read_frame(LONG_BODY)))
        .unwrap();
    page.mount_frame("y", "/js6/read/readhtml.jsp", LiveDocument::new(read_frame("Hello team, see attached.")))
        .unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    let snapshot = engine.email_snapshot(false).await;

    assert_eq!(snapshot.subject, "Status update");
    assert_eq!(snapshot.from, "grace@163.com");
    assert_eq!(snapshot.body, "");
}

#[tokio::test(start_paused = true)]
async fn frame_mutation_refreshes_cache_after_debounce() {
    let frame = LiveDocument::new(read_frame(""));
    let page = Page::new(NETEASE, LiveDocument::new(r#"<iframe id="read"></iframe>"#)).unwrap();
    page.mount_frame("read", "/js6/read/readhtml.jsp", frame.clone()).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    assert!(engine.observed_documents().contains(frame.id()));
    assert_eq!(engine.cached().await, None);

    frame.replace(read_frame(LONG_BODY));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.cached().await, None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.cached().await.unwrap().body, LONG_BODY);
}

#[tokio::test(start_paused = true)]
async fn mutation_during_refresh_is_picked_up_afterwards() {
    const LATER_BODY: &str = "Correction: the contract needs two signatures, please route it \
                              through finance before countersigning.";
    let frame = LiveDocument::new(read_frame(""));
    let page = Page::new(NETEASE, LiveDocument::new(r#"<iframe id="read"></iframe>"#)).unwrap();
    page.mount_frame("read", "/js6/read/readhtml.jsp", frame.clone()).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    // Loading placeholder: too short to count, so the refresh at 300ms keeps retrying.
    frame.replace(read_frame("Loading..."));

    tokio::time::sleep(Duration::from_millis(400)).await;
    frame.replace(read_frame(LONG_BODY));
    frame.mutate(ready_frame(LONG_BODY), mailsnap::Mutations::ATTRIBUTES);

    // Second attempt at 600ms read the first body.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.cached().await.unwrap().body, LONG_BODY);

    frame.replace(read_frame(LATER_BODY));
    frame.mutate(ready_frame(LATER_BODY), mailsnap::Mutations::ATTRIBUTES);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.cached().await.unwrap().body, LATER_BODY);
}

#[tokio::test(start_paused = true)]
async fn late_iframe_is_observed_after_rescan() {
    let top = LiveDocument::new("<html><body><div id='shell'></div></body></html>");
    let page = Arc::new(Page::new(NETEASE, top.clone()).unwrap());
    let engine = ExtractionEngine::with_builtin(page.clone(), EngineOptions::default()).unwrap();
    assert_eq!(engine.observed_documents().len(), 1);

    let frame = LiveDocument::new(read_frame(""));
    page.mount_frame("late", "/js6/read/readhtml.jsp", frame.clone()).unwrap();
    top.mutate(
        "<html><body><div id='shell'><iframe id='late'></iframe></div></body></html>",
        mailsnap::Mutations::ATTRIBUTES,
    );
    assert!(!engine.observed_documents().contains(frame.id()));

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert!(engine.observed_documents().contains(frame.id()));
    assert_eq!(engine.observed_documents().len(), 2);

    frame.replace(read_frame(LONG_BODY));
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.cached().await.unwrap().body, LONG_BODY);
}

#[tokio::test(start_paused = true)]
async fn manual_rescan_is_idempotent() {
    let page = Page::new(NETEASE, LiveDocument::new(r#"<iframe id="read"></iframe>"#)).unwrap();
    page.mount_frame("read", "about:blank", LiveDocument::new(read_frame(""))).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    assert_eq!(engine.observed_documents().len(), 2);
    assert_eq!(engine.rescan(), 0);
    assert_eq!(engine.observed_documents().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unmounted_frame_stops_contributing() {
    let page = Arc::new(Page::new(NETEASE, LiveDocument::new(r#"<iframe id="read"></iframe>"#)).unwrap());
    page.mount_frame("read", "/read", LiveDocument::new(read_frame(LONG_BODY))).unwrap();
    let engine = ExtractionEngine::with_builtin(page.clone(), EngineOptions::default()).unwrap();

    assert_eq!(engine.email_snapshot(false).await.body, LONG_BODY);

    page.unmount_frame("read").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.email_snapshot(true).await.body, "");
}

#[tokio::test(start_paused = true)]
async fn provider_failure_degrades_to_empty_snapshot() {
    init_tracing();
    let top = LiveDocument::new(r#"<h2 class="hP">Lunch?</h2>"#);
    let page = Page::new("https://mail.google.com/mail/u/0/#inbox/x", top.clone()).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    top.detach();
    let snapshot = engine.email_snapshot(true).await;
    assert!(snapshot.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transport_request_round_trip() {
    let html = r#"
        <h2 class="hP">Release notes</h2>
        <span class="go">&lt;henry@example.org&gt;</span>
        <span class="g2">Ivy &lt;ivy@example.org&gt;</span>
        <div class="a3s aiL"><p>Version 2.1 ships today.</p><style>p{}</style></div>
    "#;
    let page = Page::new("https://mail.google.com/mail/u/0/#inbox/y", LiveDocument::new(html)).unwrap();
    let engine = ExtractionEngine::with_builtin(Arc::new(page), EngineOptions::default()).unwrap();

    let request: ExtractionRequest =
        serde_json::from_str(r#"{ "requestExtraction": true, "force": false }"#).unwrap();
    let response = engine.handle_request(&request).await.unwrap();

    assert_eq!(
        response,
        ExtractionResponse::ok(EmailSnapshot {
            from: "henry@example.org".into(),
            to: "ivy@example.org".into(),
            subject: "Release notes".into(),
            body: "Version 2.1 ships today.".into(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn top_document_mutation_triggers_forced_refresh() {
    let (engine, counting) = counting_engine();

    engine.page().top().replace("<p>opened a message</p>");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cached().await.unwrap().subject, "call 1");
}

#[tokio::test(start_paused = true)]
async fn dropping_engine_stops_observation() {
    let (engine, counting) = counting_engine();
    let top = engine.page().top().clone();
    drop(engine);

    top.replace("<p>opened a message</p>");
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}
