//! Handlers for the control surface in SPEC_FULL.md §6. Each one is a
//! thin translation of an HTTP request into a call on [`fp_pipeline::Pipeline`]
//! and its result back into a response.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::Stream;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    Json(json!({
        "queue_depth": pipeline.jobs.depth(),
        "in_flight_fetches": pipeline.fetcher.in_flight_count(),
        "known_hosts": pipeline.fetcher.host_gates().known_host_count(),
        "per_host_occupancy": pipeline.fetcher.host_gates().occupancy(),
    }))
}

pub async fn enqueue_feed(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.pipeline.enqueue_now(id).await {
        Ok(()) => Json(json!({ "enqueued": true })).into_response(),
        Err(error) => (StatusCode::NOT_FOUND, Json(json!({ "error": error.to_string() }))).into_response(),
    }
}

pub async fn purge_items(State(state): State<AppState>) -> Response {
    match state.pipeline.purge_all_items().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() }))).into_response(),
    }
}

/// Import feeds from an uploaded OPML document. Accepts the first
/// multipart field regardless of its name, matching how a browser
/// `<input type="file">` posts a single attachment.
pub async fn import_feeds(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "no file field in request" }))).into_response();
        }
        Err(error) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() }))).into_response();
        }
    };

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(error) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() }))).into_response();
        }
    };

    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "uploaded file is not valid UTF-8" }))).into_response();
        }
    };

    match state.pipeline.import_feeds(text).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(error) => (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() }))).into_response(),
    }
}

pub async fn export_feeds(State(state): State<AppState>) -> Response {
    match state.pipeline.export_feeds().await {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/x-opml+xml")],
            document,
        )
            .into_response(),
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() }))).into_response(),
    }
}

/// Relay the event bus as an SSE stream. Each client gets its own
/// broadcast subscription; a lagging client drops events rather than
/// blocking the bus (§4.2).
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.pipeline.events.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    let data = serde_json::to_string(&envelope).unwrap_or_default();
                    yield Ok(SseEvent::default().event(envelope.type_name.clone()).data(data));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::new().interval(Duration::from_secs(15)))
}
