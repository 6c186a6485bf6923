use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edit_service::{EditService, HttpEditService};
use serde::{Deserialize, Serialize};
use session_core::{FrontEnd, SessionController};
use shared::domain::UserId;
use tokio::sync::Mutex;
use tracing::info;

mod config;

use config::load_settings;

/// Request/response stand-in for a push messaging transport: outbound
/// payloads are buffered per user and fetched via the outbox route.
#[derive(Default)]
struct HttpFrontEnd {
    outbox: Mutex<HashMap<UserId, Vec<OutboxEntry>>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboxEntry {
    Text { text: String },
    Image { image_b64: String, caption: String },
}

impl HttpFrontEnd {
    async fn drain(&self, user: UserId) -> Vec<OutboxEntry> {
        self.outbox.lock().await.remove(&user).unwrap_or_default()
    }
}

#[async_trait]
impl FrontEnd for HttpFrontEnd {
    async fn send_text(&self, user: UserId, text: String) -> anyhow::Result<()> {
        self.outbox
            .lock()
            .await
            .entry(user)
            .or_default()
            .push(OutboxEntry::Text { text });
        Ok(())
    }

    async fn send_image(
        &self,
        user: UserId,
        bytes: Vec<u8>,
        caption: String,
    ) -> anyhow::Result<()> {
        self.outbox
            .lock()
            .await
            .entry(user)
            .or_default()
            .push(OutboxEntry::Image {
                image_b64: STANDARD.encode(bytes),
                caption,
            });
        Ok(())
    }
}

struct AppState {
    controller: Arc<SessionController>,
    front_end: Arc<HttpFrontEnd>,
}

#[derive(Debug, Deserialize)]
struct CaptionQuery {
    caption: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    if settings.service_api_key.is_empty() {
        anyhow::bail!(
            "edit service api key is not set; provide BFL_API_KEY or service_api_key in imgpilot.toml"
        );
    }

    let service: Arc<dyn EditService> = Arc::new(HttpEditService::new(
        settings.service_base_url.clone(),
        settings.service_api_key.clone(),
    ));
    let front_end = Arc::new(HttpFrontEnd::default());
    let controller = SessionController::new(
        service,
        settings.job_config(),
        Arc::clone(&front_end) as Arc<dyn FrontEnd>,
    );

    let app = build_router(Arc::new(AppState {
        controller,
        front_end,
    }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "imgpilot listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/users/:user_id/image", post(receive_image))
        .route("/users/:user_id/text", post(receive_text))
        .route("/users/:user_id/clear", post(receive_clear))
        .route("/users/:user_id/outbox", get(fetch_outbox))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn receive_image(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(q): Query<CaptionQuery>,
    body: Bytes,
) -> StatusCode {
    state
        .controller
        .on_image(UserId(user_id), body.to_vec(), q.caption)
        .await;
    StatusCode::NO_CONTENT
}

async fn receive_text(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    body: String,
) -> StatusCode {
    state.controller.on_text(UserId(user_id), body).await;
    StatusCode::NO_CONTENT
}

async fn receive_clear(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> StatusCode {
    state.controller.on_clear(UserId(user_id)).await;
    StatusCode::NO_CONTENT
}

async fn fetch_outbox(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Json<Vec<OutboxEntry>> {
    Json(state.front_end.drain(UserId(user_id)).await)
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, time::Duration};

    use axum::{body::Body, http::Request};
    use base64::Engine as _;
    use edit_service::{EditJobConfig, EditRequest, JobHandle};
    use shared::{
        error::EditError,
        job::{ArtifactRef, JobStatus},
    };
    use tower::ServiceExt;

    use super::*;

    /// Accepts every job and completes it on the first poll with a
    /// small PNG artifact.
    struct InstantEditService;

    #[async_trait]
    impl EditService for InstantEditService {
        async fn submit_edit_job(&self, _request: EditRequest) -> Result<JobHandle, EditError> {
            Ok(JobHandle {
                request_id: "req-1".to_string(),
                polling_url: "http://service.test/poll/req-1".to_string(),
            })
        }

        async fn poll_job_status(&self, _handle: &JobHandle) -> Result<JobStatus, EditError> {
            Ok(JobStatus::Succeeded {
                artifact: ArtifactRef("http://cdn.test/out".to_string()),
            })
        }

        async fn fetch_artifact(&self, _artifact: &ArtifactRef) -> Result<Vec<u8>, EditError> {
            Ok(png(64, 48))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 140, 200]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .expect("encode png");
        out
    }

    fn test_app() -> Router {
        let service: Arc<dyn EditService> = Arc::new(InstantEditService);
        let front_end = Arc::new(HttpFrontEnd::default());
        let config = EditJobConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            deadline: Duration::from_secs(5),
            ..EditJobConfig::default()
        };
        let controller =
            SessionController::new(service, config, Arc::clone(&front_end) as Arc<dyn FrontEnd>);
        build_router(Arc::new(AppState {
            controller,
            front_end,
        }))
    }

    async fn outbox(app: &Router, user_id: i64) -> Vec<serde_json::Value> {
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/users/{user_id}/outbox"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("outbox response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn healthz_responds() {
        let app = test_app();
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn image_without_caption_is_acknowledged_via_outbox() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(
                Request::post("/users/7/image")
                    .body(Body::from(png(1200, 800)))
                    .expect("request"),
            )
            .await
            .expect("image response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let entries = outbox(&app, 7).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["type"], "text");
        assert!(entries[0]["text"]
            .as_str()
            .expect("text")
            .contains("editing instruction"));

        // Outbox drains on read.
        assert!(outbox(&app, 7).await.is_empty());
    }

    #[tokio::test]
    async fn captioned_image_eventually_delivers_a_jpeg() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(
                Request::post("/users/7/image?caption=make%20it%20warm")
                    .body(Body::from(png(1200, 800)))
                    .expect("request"),
            )
            .await
            .expect("image response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Give the settlement task time to poll and deliver.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let entries = outbox(&app, 7).await;
        let image = entries
            .iter()
            .find(|e| e["type"] == "image")
            .expect("delivered image");
        assert!(image["caption"]
            .as_str()
            .expect("caption")
            .contains("make it warm"));
        let bytes = STANDARD
            .decode(image["image_b64"].as_str().expect("payload"))
            .expect("base64");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn clear_resets_and_reports() {
        let app = test_app();
        app.clone()
            .oneshot(
                Request::post("/users/9/clear")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("clear response");

        let entries = outbox(&app, 9).await;
        assert!(entries[0]["text"]
            .as_str()
            .expect("text")
            .contains("Session cleared"));
    }
}
