//! Application state and HTTP router construction.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::db::Database;
use crate::services::{AuthConfig, AuthService, DiscardDelivery, ResetTokenDelivery};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub auth: AuthService,
    pub reset_delivery: Arc<dyn ResetTokenDelivery>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: Database) -> Self {
        let auth = AuthService::new(AuthConfig::from_config(&config));
        Self {
            config,
            db,
            auth,
            reset_delivery: Arc::new(DiscardDelivery),
        }
    }

    /// Replace where password reset tokens are sent.
    pub fn with_reset_delivery(mut self, delivery: Arc<dyn ResetTokenDelivery>) -> Self {
        self.reset_delivery = delivery;
        self
    }
}

/// Allow the configured origins, or any origin when none are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Build the full Axum router: health probes at the root, everything else
/// under the configured API prefix.
pub fn build_app(state: AppState) -> Router<()> {
    let api = Router::new()
        .merge(api::login::router())
        .merge(api::users::router())
        .merge(api::items::router());

    Router::new()
        .merge(api::health::router())
        .nest(&state.config.api_v1_str, api)
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
