use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::dto::{
    AdminInfoResponse, AdminSetRequest, ChangePasswordRequest, LoginRequest, LogoutRequest,
    SelectRequest, SettingsResponse, SettingsSetRequest, StatusResponse, TemplateListResponse,
    UserPayload,
};
use super::payload;
use super::response::ApiError;
use super::router::AppState;
use super::session::{SessionContext, client_ip};
use super::validation::{
    MAX_DESCRIPTION_LEN, MAX_KEYWORDS_LEN, MAX_SITE_NAME_LEN, check_max_len, collapse_newlines,
    strip_angle_brackets,
};
use crate::auth::{MIN_SECRET_LEN, sanitize_username};
use crate::error::Error;
use crate::templates;
use crate::types::SettingsPatch;

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub action: String,
}

/// Read-side actions. The set is closed: anything else is a 404.
#[derive(Debug, Clone, Copy)]
enum GetAction {
    Status,
    List,
    AdminInfo,
    SettingsGet,
}

impl GetAction {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "status" => Some(Self::Status),
            "list" => Some(Self::List),
            "admin_info" => Some(Self::AdminInfo),
            "settings_get" => Some(Self::SettingsGet),
            _ => None,
        }
    }
}

/// Write-side actions, equally closed.
#[derive(Debug, Clone, Copy)]
enum PostAction {
    Select,
    Login,
    Logout,
    AdminSet,
    AdminChangePassword,
    SettingsSet,
}

impl PostAction {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "select" => Some(Self::Select),
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "admin_set" => Some(Self::AdminSet),
            "admin_change_password" => Some(Self::AdminChangePassword),
            "settings_set" => Some(Self::SettingsSet),
            _ => None,
        }
    }
}

pub async fn dispatch_get(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<ActionQuery>,
) -> Result<Response, ApiError> {
    let action = GetAction::parse(&query.action)
        .ok_or_else(|| ApiError::not_found(format!("Unknown action '{}'", query.action)))?;

    match action {
        GetAction::Status => status(&state, &session),
        GetAction::List => list(&state, &session),
        GetAction::AdminInfo => admin_info(&state, &session),
        GetAction::SettingsGet => settings_get(&state, &session),
    }
}

pub async fn dispatch_post(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<ActionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let action = PostAction::parse(&query.action)
        .ok_or_else(|| ApiError::not_found(format!("Unknown action '{}'", query.action)))?;
    let ip = client_ip(&headers);

    match action {
        PostAction::Select => select(&state, &session, payload::decode(&body)?),
        PostAction::Login => login(&state, &session, &ip, payload::decode(&body)?),
        PostAction::Logout => logout(&state, &session, payload::decode(&body)?),
        PostAction::AdminSet => admin_set(&state, &session, payload::decode(&body)?),
        PostAction::AdminChangePassword => {
            admin_change_password(&state, &session, payload::decode(&body)?)
        }
        PostAction::SettingsSet => settings_set(&state, &session, payload::decode(&body)?),
    }
}

// Preconditions.

fn require_auth(state: &AppState, session: &SessionContext) -> Result<(), ApiError> {
    if state.guard.is_authenticated(&session.id()) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Unauthorized: please log in first"))
    }
}

fn require_csrf(state: &AppState, session: &SessionContext, token: &str) -> Result<(), ApiError> {
    if state.guard.check_csrf(&session.id(), token) {
        Ok(())
    } else {
        Err(ApiError::forbidden("CSRF check failed"))
    }
}

// GET handlers.

fn status(state: &AppState, session: &SessionContext) -> Result<Response, ApiError> {
    let s = state.guard.state(&session.id());
    let logged_in = s.logged_in && s.user_id > 0;
    Ok(Json(StatusResponse {
        logged_in,
        user: UserPayload {
            id: s.user_id,
            username: s.username,
            roles: s.roles,
        },
        csrf_token: s.csrf_token,
    })
    .into_response())
}

fn list(state: &AppState, session: &SessionContext) -> Result<Response, ApiError> {
    require_auth(state, session)?;

    let templates = templates::list_templates(&state.template_dir).map_err(ApiError::from)?;
    let selected = state.store.read_settings().selected_template;
    let mut body = serde_json::to_value(TemplateListResponse {
        templates,
        selected,
    })
    .map_err(|_| ApiError::internal("Internal server error"))?;
    body["csrf_token"] = json!(state.guard.csrf_token(&session.id()));
    Ok(Json(body).into_response())
}

fn admin_info(state: &AppState, session: &SessionContext) -> Result<Response, ApiError> {
    let admin = state.credentials.get_admin().map_err(ApiError::from)?;
    Ok(Json(AdminInfoResponse {
        configured: admin.is_some(),
        username: admin.map(|a| a.username).unwrap_or_default(),
        csrf_token: state.guard.csrf_token(&session.id()),
    })
    .into_response())
}

fn settings_get(state: &AppState, session: &SessionContext) -> Result<Response, ApiError> {
    require_auth(state, session)?;

    let settings = state.store.read_settings();
    let mut body = serde_json::to_value(SettingsResponse::from(settings))
        .map_err(|_| ApiError::internal("Internal server error"))?;
    body["csrf_token"] = json!(state.guard.csrf_token(&session.id()));
    Ok(Json(body).into_response())
}

// POST handlers.

fn select(
    state: &AppState,
    session: &SessionContext,
    req: SelectRequest,
) -> Result<Response, ApiError> {
    require_auth(state, session)?;
    require_csrf(state, session, &req.csrf_token)?;

    let name = req.template.trim();
    if !templates::is_valid_template_name(name) {
        return Err(ApiError::bad_request("Invalid template name"));
    }
    if let Err(e) = templates::resolve_template(&state.template_dir, name) {
        return Err(match e {
            Error::NotFound => ApiError::not_found("Template not found or missing index.html"),
            e => ApiError::from(e),
        });
    }

    state
        .store
        .update_settings(&SettingsPatch {
            selected_template: Some(name.to_string()),
            ..Default::default()
        })
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "message": "Template selected", "selected": name })).into_response())
}

fn login(
    state: &AppState,
    session: &SessionContext,
    ip: &str,
    req: LoginRequest,
) -> Result<Response, ApiError> {
    require_csrf(state, session, &req.csrf_token)?;

    let username = sanitize_username(req.username.trim());
    match state.guard.login(&session.id(), &username, &req.password, ip) {
        Ok((new_id, admin)) => {
            let user = UserPayload::from(&admin);
            session.rotate(new_id);
            Ok(Json(json!({ "message": "Login successful", "user": user })).into_response())
        }
        Err(Error::Unauthorized) => Err(ApiError::unauthorized("Invalid username or password")),
        Err(e) => Err(ApiError::from(e)),
    }
}

fn logout(
    state: &AppState,
    session: &SessionContext,
    req: LogoutRequest,
) -> Result<Response, ApiError> {
    require_csrf(state, session, &req.csrf_token)?;

    let fresh = state.guard.logout(&session.id());
    session.rotate(fresh);
    Ok(Json(json!({ "message": "Logged out" })).into_response())
}

fn admin_set(
    state: &AppState,
    session: &SessionContext,
    req: AdminSetRequest,
) -> Result<Response, ApiError> {
    require_csrf(state, session, &req.csrf_token)?;

    // First-time setup is open; once an account exists, changing it
    // requires being logged in as that account.
    let configured = state.credentials.is_configured().map_err(ApiError::from)?;
    if configured {
        require_auth(state, session)?;
    }

    let username = sanitize_username(req.username.trim());
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Username or password is empty"));
    }
    if req.password.chars().count() < MIN_SECRET_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_SECRET_LEN} characters"
        )));
    }

    let admin = state
        .credentials
        .set_admin(&username, &req.password)
        .map_err(ApiError::from)?;

    if !configured {
        let new_id = state.guard.mark_logged_in(&session.id(), &admin);
        session.rotate(new_id);
    }

    Ok(Json(json!({ "message": "Admin account saved", "username": admin.username }))
        .into_response())
}

fn admin_change_password(
    state: &AppState,
    session: &SessionContext,
    req: ChangePasswordRequest,
) -> Result<Response, ApiError> {
    require_auth(state, session)?;
    require_csrf(state, session, &req.csrf_token)?;

    state
        .credentials
        .change_password(&req.current_password, &req.new_password)
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "message": "Password updated" })).into_response())
}

fn settings_set(
    state: &AppState,
    session: &SessionContext,
    req: SettingsSetRequest,
) -> Result<Response, ApiError> {
    require_auth(state, session)?;
    require_csrf(state, session, &req.csrf_token)?;

    let site_name = collapse_newlines(&req.site_name);
    let site_keywords = strip_angle_brackets(&collapse_newlines(&req.site_keywords));
    let site_description = strip_angle_brackets(&collapse_newlines(&req.site_description));

    if site_name.is_empty() {
        return Err(ApiError::bad_request("Site name must not be empty"));
    }
    check_max_len(&site_name, MAX_SITE_NAME_LEN, "Site name")?;
    check_max_len(&site_keywords, MAX_KEYWORDS_LEN, "Site keywords")?;
    check_max_len(&site_description, MAX_DESCRIPTION_LEN, "Site description")?;

    let saved = state
        .store
        .update_settings(&SettingsPatch {
            site_name: Some(site_name),
            site_keywords: Some(site_keywords),
            site_description: Some(site_description),
            ..Default::default()
        })
        .map_err(ApiError::from)?;

    Ok(Json(json!({
        "message": "Settings saved",
        "site_name": saved.site_name,
        "site_keywords": saved.site_keywords,
        "site_description": saved.site_description,
    }))
    .into_response())
}
