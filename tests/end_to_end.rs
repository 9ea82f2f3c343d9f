//! Full text-to-video scenarios against a mocked resolver and CDN.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use sora_fetch_bot::bot::state::RequestPhase;
use sora_fetch_bot::bot::views::{
    BotView, DefaultBotView, BTN_NEW_LINK, BTN_NO_WATERMARK, BTN_ORIGINAL,
};
use sora_fetch_bot::bot::{ChatOutbound, DownloadOrchestrator, LinkFlow, MessageHandle};
use sora_fetch_bot::cache::LinkCache;
use sora_fetch_bot::download::{BackoffPolicy, DownloadEngine};
use sora_fetch_bot::resolver::ResolverClient;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LINK: &str = "https://sora.chatgpt.com/p/s_abc123";
const USER: i64 = 77;
const INBOUND: MessageHandle = MessageHandle(1);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Text(String),
    Menu(String),
    Edit(String),
    Delete(i32),
    Video { file_name: String, bytes: Vec<u8> },
}

struct RecordingOutbound {
    next_id: AtomicI32,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingOutbound {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI32::new(100),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, item: Sent) -> MessageHandle {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(item);
        }
        MessageHandle(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn videos(&self) -> Vec<(String, Vec<u8>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Video { file_name, bytes } => Some((file_name, bytes)),
                _ => None,
            })
            .collect()
    }

    fn replies(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) | Sent::Menu(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatOutbound for RecordingOutbound {
    async fn send_text(&self, text: &str) -> Result<MessageHandle> {
        Ok(self.push(Sent::Text(text.to_string())))
    }

    async fn send_menu(&self, text: &str) -> Result<MessageHandle> {
        Ok(self.push(Sent::Menu(text.to_string())))
    }

    async fn edit_text(&self, _handle: MessageHandle, text: &str) -> Result<()> {
        self.push(Sent::Edit(text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<()> {
        self.push(Sent::Delete(handle.0));
        Ok(())
    }

    async fn send_video(&self, path: &Path, file_name: &str, _caption: &str) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        self.push(Sent::Video {
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(())
    }
}

struct Harness {
    server: MockServer,
    cache: LinkCache,
    flow: LinkFlow,
    dir: TempDir,
}

impl Harness {
    async fn new(attempts: usize) -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = LinkCache::new(600, 100);
        let resolver = ResolverClient::new(format!("{}/api/video-info", server.uri()));
        let engine =
            DownloadEngine::new(dir.path()).with_backoff(BackoffPolicy::immediate(attempts));
        let orchestrator = DownloadOrchestrator::new(Arc::new(engine))
            .with_poll_interval(Duration::from_millis(20));
        let flow = LinkFlow::new(cache.clone(), resolver, Arc::new(orchestrator));
        Self {
            server,
            cache,
            flow,
            dir,
        }
    }

    fn cdn(&self, file: &str) -> String {
        format!("{}/{file}", self.server.uri())
    }

    async fn mount_resolver(&self, answer: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/video-info"))
            .and(body_json(json!({ "url": LINK })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer))
            .mount(&self.server)
            .await;
    }

    async fn send(&self, outbound: &Arc<RecordingOutbound>, text: &str) -> RequestPhase {
        let outbound: Arc<dyn ChatOutbound> = outbound.clone();
        self.flow
            .handle_text(Some(USER), text, Some(INBOUND), outbound)
            .await
            .expect("replies are delivered")
    }

    fn download_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.dir.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}

#[tokio::test]
async fn link_then_buttons_deliver_both_variants() {
    let h = Harness::new(1).await;
    h.mount_resolver(json!({ "videoUrlHQ": h.cdn("x.mp4"), "url": h.cdn("y.mp4") }))
        .await;
    Mock::given(method("GET"))
        .and(path("/y.mp4"))
        .and(header("range", "bytes=0-"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'y'; 3000]))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 1200]))
        .expect(1)
        .mount(&h.server)
        .await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, LINK).await, RequestPhase::AwaitingAction);

    let sent = outbound.sent();
    assert_eq!(sent[0], Sent::Menu(DefaultBotView::link_accepted().to_string()));
    assert_eq!(sent[1], Sent::Menu(DefaultBotView::links_ready().to_string()));
    assert_eq!(sent[2], Sent::Delete(INBOUND.0));

    let entry = h.cache.get(USER).await.expect("entry cached");
    assert_eq!(entry.source_link.as_deref(), Some(LINK));
    assert_eq!(entry.alternate_url, Some(h.cdn("y.mp4")));

    assert_eq!(h.send(&outbound, BTN_ORIGINAL).await, RequestPhase::Done);
    assert!(h.download_dir_is_empty());
    assert!(h.cache.get(USER).await.is_some());

    assert_eq!(h.send(&outbound, BTN_NO_WATERMARK).await, RequestPhase::Done);
    assert!(h.download_dir_is_empty());

    let videos = outbound.videos();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0], ("sora_original.mp4".to_string(), vec![b'y'; 3000]));
    assert_eq!(videos[1], ("sora_no_watermark.mp4".to_string(), vec![b'x'; 1200]));
}

#[tokio::test]
async fn button_without_link_asks_for_one() {
    let h = Harness::new(1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, BTN_ORIGINAL).await, RequestPhase::Idle);
    assert_eq!(
        outbound.sent(),
        vec![Sent::Menu(DefaultBotView::send_link_first().to_string())]
    );
}

#[tokio::test]
async fn resolver_failure_is_reported_once_and_not_cached() {
    let h = Harness::new(1).await;
    Mock::given(method("POST"))
        .and(path("/api/video-info"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, LINK).await, RequestPhase::Failed);
    assert_eq!(
        outbound.sent().last(),
        Some(&Sent::Text(DefaultBotView::resolution_failed().to_string()))
    );
    assert!(!outbound.sent().contains(&Sent::Delete(INBOUND.0)));
    assert!(h.cache.get(USER).await.is_none());
}

#[tokio::test]
async fn empty_resolution_is_cached_and_variant_reported_missing() {
    let h = Harness::new(1).await;
    h.mount_resolver(json!({ "videoUrlHQ": "", "url": null })).await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, LINK).await, RequestPhase::Failed);
    assert_eq!(
        outbound.sent().last(),
        Some(&Sent::Text(DefaultBotView::no_links_found().to_string()))
    );
    assert!(h.cache.get(USER).await.is_some_and(|e| e.is_empty()));

    assert_eq!(h.send(&outbound, BTN_NO_WATERMARK).await, RequestPhase::Failed);
    assert_eq!(
        outbound.sent().last(),
        Some(&Sent::Text(DefaultBotView::variant_missing().to_string()))
    );
}

#[tokio::test]
async fn new_link_button_forgets_cached_links() {
    let h = Harness::new(1).await;
    h.cache
        .put(USER, Some(LINK.to_string()), Some(h.cdn("x.mp4")), None)
        .await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, BTN_NEW_LINK).await, RequestPhase::Idle);
    assert!(h.cache.get(USER).await.is_none());

    h.send(&outbound, BTN_NO_WATERMARK).await;
    assert_eq!(
        outbound.sent().last(),
        Some(&Sent::Menu(DefaultBotView::send_link_first().to_string()))
    );
}

#[tokio::test]
async fn failed_download_shows_only_generic_message() {
    let h = Harness::new(2).await;
    h.cache
        .put(USER, Some(LINK.to_string()), None, Some(h.cdn("gone.mp4")))
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&h.server)
        .await;
    let outbound = RecordingOutbound::new();

    assert_eq!(h.send(&outbound, BTN_ORIGINAL).await, RequestPhase::Failed);

    let texts = outbound.replies();
    assert_eq!(
        texts.last().map(String::as_str),
        Some(DefaultBotView::download_failed())
    );
    assert!(!texts
        .iter()
        .any(|t| t.contains("404") || t.contains("gone.mp4") || t.contains(LINK)));
    assert!(outbound.videos().is_empty());
    assert!(h.download_dir_is_empty());
}

#[tokio::test]
async fn other_text_gets_usage_hint() {
    let h = Harness::new(1).await;
    let outbound = RecordingOutbound::new();

    assert_eq!(
        h.send(&outbound, "https://example.com/p/s_abc").await,
        RequestPhase::Idle
    );
    assert_eq!(
        outbound.sent(),
        vec![Sent::Menu(DefaultBotView::usage_hint().to_string())]
    );
}

#[tokio::test]
async fn message_without_sender_is_ignored() {
    let h = Harness::new(1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;
    let outbound = RecordingOutbound::new();
    let dyn_outbound: Arc<dyn ChatOutbound> = outbound.clone();

    let phase = h
        .flow
        .handle_text(None, LINK, Some(INBOUND), dyn_outbound)
        .await
        .expect("nothing to send");

    assert_eq!(phase, RequestPhase::Idle);
    assert!(outbound.sent().is_empty());
    assert!(h.cache.get(0).await.is_none());
}
