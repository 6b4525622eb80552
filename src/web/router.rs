//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::{handlers, stream, AppState};
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        // Query routes
        .route("/api/daily", get(handlers::list_daily))
        .route("/api/daily/latest", get(handlers::latest_daily))
        .route("/api/monthly", get(handlers::list_monthly))
        .route("/api/yearly", get(handlers::list_yearly))
        // Live routes
        .route("/api/stream", get(stream::sse_handler))
        .route("/ws", get(stream::websocket_handler))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
