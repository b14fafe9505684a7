use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Discord interactions endpoint; every request must carry a valid signature
        .route(
            "/interactions",
            post(handlers::interactions::handle_interaction).layer(
                middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::signature::signature_middleware,
                ),
            ),
        )
        .route_layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
