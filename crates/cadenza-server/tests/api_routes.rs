use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use cadenza_core::auth::SudoAuthorizer;
use cadenza_core::manager::{PlaybackConfig, QueueManager};
use cadenza_core::sim::SimulatedEngine;
use cadenza_media::download::AttachmentDownloader;
use cadenza_server::api::{build_router, AppState};

const SUDO_USER: i64 = 7;

struct ApiTestContext {
    app: Router,
    _media_dir: TempDir,
}

impl ApiTestContext {
    fn new() -> anyhow::Result<Self> {
        let media_dir = tempfile::tempdir()?;

        // Long simulated tracks so nothing auto-ends mid-test.
        let engine = Arc::new(SimulatedEngine::new(Duration::from_secs(600)));
        let manager = Arc::new(QueueManager::new(engine, PlaybackConfig::default()));

        let state = AppState {
            manager,
            authorizer: Arc::new(SudoAuthorizer::new([SUDO_USER])),
            downloader: Arc::new(AttachmentDownloader::new(media_dir.path(), 1024 * 1024)),
            extractor: None,
        };

        Ok(Self {
            app: build_router(state),
            _media_dir: media_dir,
        })
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<i64>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn enqueue_file(&self, name: &str) -> anyhow::Result<(StatusCode, Value)> {
        self.request(
            Method::POST,
            "/api/v1/conversations/100/queue",
            Some(SUDO_USER),
            Some(json!({ "file": format!("/srv/media/{name}"), "title": name })),
        )
        .await
    }
}

#[tokio::test]
async fn health_is_open() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    let (status, body) = ctx
        .request(Method::GET, "/api/v1/health", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn enqueue_requires_a_known_user() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;

    let (status, _) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/queue",
            None,
            Some(json!({ "file": "/srv/media/a.mp3" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/queue",
            Some(999),
            Some(json!({ "file": "/srv/media/a.mp3" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn first_enqueue_starts_playback_at_position_one() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    let (status, body) = ctx.enqueue_file("a.mp3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 1);
    assert_eq!(body["started"], true);
    assert_eq!(body["title"], "a.mp3");
    Ok(())
}

#[tokio::test]
async fn queue_listing_marks_the_active_item() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    ctx.enqueue_file("a.mp3").await?;
    ctx.enqueue_file("b.mp3").await?;
    ctx.enqueue_file("c.mp4").await?;

    let (status, body) = ctx
        .request(Method::GET, "/api/v1/conversations/100/queue", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["now_playing"]["title"], "a.mp3");
    assert_eq!(body["now_playing"]["requested_by"], SUDO_USER);
    let pending = body["pending"].as_array().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0]["position"], 1);
    assert_eq!(pending[0]["title"], "b.mp3");
    assert_eq!(pending[1]["title"], "c.mp4");
    assert_eq!(pending[1]["kind"], "video");
    Ok(())
}

#[tokio::test]
async fn skip_advances_to_the_next_item() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    ctx.enqueue_file("a.mp3").await?;
    ctx.enqueue_file("b.mp3").await?;

    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/skip",
            Some(SUDO_USER),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "started");
    assert_eq!(body["title"], "b.mp3");
    Ok(())
}

#[tokio::test]
async fn skip_on_empty_backlog_leaves_the_call() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    ctx.enqueue_file("a.mp3").await?;

    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/skip",
            Some(SUDO_USER),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "queue_empty");
    assert_eq!(body["left"], true);

    let (_, body) = ctx
        .request(Method::GET, "/api/v1/conversations/100/queue", None, None)
        .await?;
    assert!(body["now_playing"].is_null());
    Ok(())
}

#[tokio::test]
async fn stop_is_idempotent_and_can_clear_the_backlog() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;

    // Stopping a conversation that never played is fine.
    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/stop",
            Some(SUDO_USER),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], false);
    assert_eq!(body["cleared"], 0);

    ctx.enqueue_file("a.mp3").await?;
    ctx.enqueue_file("b.mp3").await?;
    ctx.enqueue_file("c.mp3").await?;

    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/stop",
            Some(SUDO_USER),
            Some(json!({ "clear_queue": true })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], true);
    assert_eq!(body["cleared"], 2);
    Ok(())
}

#[tokio::test]
async fn link_requests_without_extractor_are_unprocessable() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    let (status, body) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/queue",
            Some(SUDO_USER),
            Some(json!({ "url": "https://youtu.be/abc" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("yt-dlp"));
    Ok(())
}

#[tokio::test]
async fn bodyless_enqueue_is_a_bad_request() -> anyhow::Result<()> {
    let ctx = ApiTestContext::new()?;
    let (status, _) = ctx
        .request(
            Method::POST,
            "/api/v1/conversations/100/queue",
            Some(SUDO_USER),
            Some(json!({})),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
