pub mod auth;
pub mod handlers;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the control surface router (SPEC_FULL.md §6).
///
/// `/v1/health` is public; every other route sits behind the bearer-token
/// middleware attached via `route_layer` on the protected sub-router.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(handlers::health));

    let protected = Router::new()
        .route("/v1/feeds/:id/enqueue", post(handlers::enqueue_feed))
        .route("/v1/maintenance/purge-items", post(handlers::purge_items))
        .route("/v1/feeds/import", post(handlers::import_feeds))
        .route("/v1/feeds/export", get(handlers::export_feeds))
        .route("/v1/events", get(handlers::events))
        .route("/v1/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
