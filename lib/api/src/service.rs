//! The event-ingest API service.
//!
//! A small HTTP surface that accepts event payloads and publishes them onto
//! the event stream for the runner:
//!
//! - `GET /` and `GET /health`: health check
//! - `POST /e/{key}`: receive one event or an array of events

use amber_relay_config::Config;
use amber_relay_core::{BoxError, Event, Service};
use amber_relay_pubsub::{Message, Publisher};
use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The HTTP event-ingest service.
pub struct EventApiService {
    config: Arc<Config>,
    router: Option<axum::Router>,
}

impl EventApiService {
    /// Creates the service over the given configuration.
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            router: None,
        }
    }
}

#[async_trait]
impl Service for EventApiService {
    fn name(&self) -> &'static str {
        "event-api"
    }

    async fn pre(&mut self) -> Result<(), BoxError> {
        let publisher = self.config.event_stream.publish_subscriber().await?;
        self.router = Some(router(Arc::new(ApiState {
            publisher,
            topic: self.config.event_stream.topic.clone(),
            max_size: self.config.event_api.max_size,
        })));
        Ok(())
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        let Some(router) = self.router.take() else {
            return Err("event api started without pre".into());
        };

        let addr = format!(
            "{}:{}",
            self.config.event_api.addr, self.config.event_api.port
        );
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "starting event api");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        Ok(())
    }

    async fn stop(&mut self, _cancel: CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }
}

struct ApiState {
    publisher: Arc<dyn Publisher>,
    topic: String,
    max_size: usize,
}

/// Builds the API router.
fn router(state: Arc<ApiState>) -> axum::Router {
    axum::Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/e", post(missing_key))
        .route("/e/", post(missing_key))
        .route("/e/{key}", post(receive_event))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ApiResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn ok(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: StatusCode::OK.as_u16(),
                message: Some(message.into()),
                error: None,
            }),
        )
    }

    fn error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                status: status.as_u16(),
                message: None,
                error: Some(error.into()),
            }),
        )
    }
}

async fn health() -> (StatusCode, Json<ApiResponse>) {
    ApiResponse::ok("OK")
}

async fn missing_key() -> (StatusCode, Json<ApiResponse>) {
    ApiResponse::error(StatusCode::UNAUTHORIZED, "API key is required")
}

async fn receive_event(
    State(state): State<Arc<ApiState>>,
    Path(_key): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<ApiResponse>) {
    if body.len() > state.max_size {
        return ApiResponse::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload larger than maximum allowed",
        );
    }

    let Ok(events) = parse_body(&body) else {
        return ApiResponse::error(StatusCode::BAD_REQUEST, "Unable to process event payload");
    };

    // Publish concurrently; one bad event does not hold up the rest.
    let mut tasks = tokio::task::JoinSet::new();
    for event in &events {
        let message = match Message::received_event(event) {
            Ok(message) => message,
            Err(err) => {
                return ApiResponse::error(StatusCode::BAD_REQUEST, err.to_string());
            }
        };
        let publisher = Arc::clone(&state.publisher);
        let topic = state.topic.clone();
        let name = event.name.clone();
        tasks.spawn(async move {
            publisher.publish(&topic, message).await.map_err(|err| {
                tracing::error!(event = %name, error = %err, "error handling event");
                err
            })
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return ApiResponse::error(StatusCode::BAD_REQUEST, err.to_string()),
            Err(err) => return ApiResponse::error(StatusCode::BAD_REQUEST, err.to_string()),
        }
    }

    ApiResponse::ok(format!("Received {} events", events.len()))
}

/// Parses a body holding either one event or an array of events.
fn parse_body(body: &[u8]) -> Result<Vec<Event>, serde_json::Error> {
    let trimmed = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&body[..0], |start| &body[start..]);

    if trimmed.first() == Some(&b'[') {
        serde_json::from_slice(trimmed)
    } else {
        serde_json::from_slice::<Event>(trimmed).map(|event| vec![event])
    }
}
