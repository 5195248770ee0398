use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use super::router::AppState;

pub const SESSION_COOKIE: &str = "placard_session";

/// Per-request handle on the session id. Handlers that regenerate the id
/// (login, logout, first-time setup) call [`SessionContext::rotate`] so the
/// middleware sends the replacement cookie on the way out.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    id: String,
    send_cookie: bool,
}

impl SessionContext {
    fn new(id: String, send_cookie: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { id, send_cookie })),
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.inner.lock().expect("session context poisoned").id.clone()
    }

    pub fn rotate(&self, new_id: String) {
        let mut inner = self.inner.lock().expect("session context poisoned");
        inner.id = new_id;
        inner.send_cookie = true;
    }

    fn cookie_header(&self) -> Option<String> {
        let inner = self.inner.lock().expect("session context poisoned");
        inner.send_cookie.then(|| {
            format!(
                "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Strict",
                inner.id
            )
        })
    }
}

/// Opens (or resumes) the session named by the request cookie, exposes it to
/// handlers through a [`SessionContext`] extension, and stamps the response
/// with the cookie and browser hardening headers.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = extract_session_cookie(req.headers());
    let (id, created) = state.guard.open(existing.as_deref());
    let ctx = SessionContext::new(id, created);
    req.extensions_mut().insert(ctx.clone());

    let mut response = next.run(req).await;

    if let Some(cookie) = ctx.cookie_header() {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
        .headers_mut()
        .insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));

    response
}

fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Best-effort client address for rate-limit keying. Proxied deployments
/// put the real address first in `X-Forwarded-For`.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}
