use serde::{Deserialize, Serialize};

use crate::types::{AdminRecord, SiteSettings, TemplateDescriptor};

// Requests. Every field defaults so a missing key reads as empty and is
// rejected by validation rather than by the deserializer.

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminSetRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSetRequest {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub site_keywords: String,
    #[serde(default)]
    pub site_description: String,
    #[serde(default)]
    pub csrf_token: String,
}

// Responses.

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub id: i64,
    pub username: String,
    pub roles: Vec<String>,
}

impl From<&AdminRecord> for UserPayload {
    fn from(admin: &AdminRecord) -> Self {
        Self {
            id: admin.id,
            username: admin.username.clone(),
            roles: admin.roles.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub logged_in: bool,
    pub user: UserPayload,
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct AdminInfoResponse {
    pub configured: bool,
    pub username: String,
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateDescriptor>,
    pub selected: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub site_name: String,
    pub site_keywords: String,
    pub site_description: String,
    pub selected_template: String,
}

impl From<SiteSettings> for SettingsResponse {
    fn from(s: SiteSettings) -> Self {
        Self {
            site_name: s.site_name,
            site_keywords: s.site_keywords,
            site_description: s.site_description,
            selected_template: s.selected_template,
        }
    }
}
