use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};

use super::handlers;
use super::response::ApiError;
use super::session;
use crate::auth::{Credentials, MemorySessions, SessionGuard, SessionStore};
use crate::config::ServerConfig;
use crate::render;
use crate::store::Store;

/// Shared server state: the document store plus the credential and session
/// components layered on it, and the template catalog location.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub credentials: Credentials,
    pub guard: SessionGuard,
    pub template_dir: PathBuf,
    pub default_template: String,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &ServerConfig) -> Self {
        Self::with_sessions(store, config, Arc::new(MemorySessions::new()))
    }

    /// Like [`AppState::new`] with an injected session store, so tests can
    /// inspect and pre-seed session state.
    #[must_use]
    pub fn with_sessions(
        store: Arc<dyn Store>,
        config: &ServerConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let credentials = Credentials::new(store.clone());
        let guard = SessionGuard::new(sessions, credentials.clone());
        Self {
            store,
            credentials,
            guard,
            template_dir: config.template_dir.clone(),
            default_template: config.default_template.clone(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(render::home))
        .route("/health", get(health))
        .route(
            "/api",
            get(handlers::dispatch_get)
                .post(handlers::dispatch_post)
                .fallback(unknown)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    session::attach_session,
                )),
        )
        .fallback(unknown)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn unknown() -> ApiError {
    ApiError::not_found("Not found")
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        "{} {} {} ({:?})",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed()
    );
    response
}
