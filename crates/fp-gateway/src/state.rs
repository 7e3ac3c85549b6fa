use std::sync::Arc;

use fp_pipeline::Pipeline;

/// Everything an HTTP handler needs. Thin by design — almost everything
/// it does is delegate straight to [`Pipeline`]; the only gateway-owned
/// piece of state is the cached API token digest.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// SHA-256 digest of the configured API token, cached once at
    /// startup. `None` means the control surface is unauthenticated
    /// (dev mode) — see `api::auth`.
    pub api_token_hash: Option<Vec<u8>>,
}
