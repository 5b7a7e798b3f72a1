//! Application setup and server configuration.

use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domains::auth::{AuthFlow, AuthorizationEngine};
use crate::kernel::ServerDeps;
use crate::server::routes::{health_handler, login_handler, logout_handler};

/// Upper bound for one request, including the cross-tenant scan
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: AuthorizationEngine,
}

impl AppState {
    pub fn deps(&self) -> &ServerDeps {
        self.engine.deps()
    }
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, flow: AuthFlow) -> Router {
    let app_state = AppState {
        engine: AuthorizationEngine::new(deps, flow),
    };

    // Device clients call from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
