use axum::http::HeaderValue;
use axum::Router;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::api_routes;
use crate::config::ServerConfig;

use super::AppState;

/// Configured origin allow-list; an empty list means any origin.
/// Unparseable entries are skipped with a warning rather than failing
/// startup.
fn allowed_origins(config: &ServerConfig) -> AllowOrigin {
    if config.cors_origins.is_empty() {
        return AllowOrigin::any();
    }
    let parsed: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.settings.server))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}
