use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single administrator account. `id` is always 1; there is exactly one
/// of these per installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: i64,
    pub username: String,
    /// Stored credential: an argon2id PHC string for anything this program
    /// writes, possibly plaintext in documents carried over from older
    /// installs. Never serialized into API responses.
    #[serde(skip)]
    pub secret: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Site-wide text fields plus the currently selected template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_keywords: String,
    pub site_description: String,
    pub selected_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial settings update: only `Some` fields are overlaid onto the stored
/// document.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub site_name: Option<String>,
    pub site_keywords: Option<String>,
    pub site_description: Option<String>,
    pub selected_template: Option<String>,
}

/// A template directory as seen by the catalog listing. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDescriptor {
    pub name: String,
    pub has_index: bool,
}
