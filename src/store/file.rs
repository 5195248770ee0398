use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Store;
use crate::error::{Error, Result};
use crate::types::{AdminRecord, SettingsPatch, SiteSettings};

const ADMIN_ID: i64 = 1;

/// On-disk shape of the merged admin + settings document. Every field is
/// optional so documents written by older versions still load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    site_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// JSON document store. A single `Mutex` is held across every
/// read-merge-write sequence so concurrent writers cannot interleave, and
/// each persist goes through a temp file + atomic rename so readers never
/// observe a torn document.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Loads the document, treating a missing or unparseable file as empty.
    fn load(&self) -> Document {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Document::default(),
            Err(e) => {
                tracing::warn!("Cannot read {}: {e}", self.path.display());
                return Document::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("Malformed store document {}: {e}", self.path.display());
                Document::default()
            }
        }
    }

    fn persist(&self, doc: &Document) -> Result<()> {
        let parent = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::Internal(format!("failed to serialize store document: {e}")))?;

        let mut temp_file = File::create(&temp_path)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn admin_from(doc: &Document) -> Option<AdminRecord> {
        let username = doc.username.as_deref().filter(|u| !u.is_empty())?;
        let secret = doc.password.as_deref().filter(|p| !p.is_empty())?;

        Some(AdminRecord {
            id: doc.id.unwrap_or(ADMIN_ID),
            username: username.to_string(),
            secret: secret.to_string(),
            roles: doc
                .roles
                .clone()
                .unwrap_or_else(|| vec!["admin".to_string()]),
            updated_at: doc.updated_at,
        })
    }

    fn settings_from(doc: &Document) -> SiteSettings {
        SiteSettings {
            site_name: doc.site_name.clone().unwrap_or_default(),
            site_keywords: doc.site_keywords.clone().unwrap_or_default(),
            site_description: doc.site_description.clone().unwrap_or_default(),
            selected_template: doc.selected_template.clone().unwrap_or_default(),
            updated_at: doc.updated_at,
        }
    }
}

impl Store for FileStore {
    fn get_admin(&self) -> Result<Option<AdminRecord>> {
        let _guard = self.lock.lock().expect("store lock poisoned");
        Ok(Self::admin_from(&self.load()))
    }

    fn put_admin(&self, username: &str, secret: &str) -> Result<AdminRecord> {
        let _guard = self.lock.lock().expect("store lock poisoned");

        let mut doc = self.load();
        doc.id = Some(doc.id.unwrap_or(ADMIN_ID));
        doc.username = Some(username.to_string());
        doc.password = Some(secret.to_string());
        doc.roles = Some(
            doc.roles
                .take()
                .unwrap_or_else(|| vec!["admin".to_string()]),
        );
        doc.updated_at = Some(Utc::now());

        self.persist(&doc)?;
        Self::admin_from(&doc)
            .ok_or_else(|| Error::Internal("admin record empty after write".to_string()))
    }

    fn read_settings(&self) -> SiteSettings {
        let _guard = self.lock.lock().expect("store lock poisoned");
        Self::settings_from(&self.load())
    }

    fn update_settings(&self, patch: &SettingsPatch) -> Result<SiteSettings> {
        let _guard = self.lock.lock().expect("store lock poisoned");

        let mut doc = self.load();
        if let Some(name) = &patch.site_name {
            doc.site_name = Some(name.clone());
        }
        if let Some(keywords) = &patch.site_keywords {
            doc.site_keywords = Some(keywords.clone());
        }
        if let Some(description) = &patch.site_description {
            doc.site_description = Some(description.clone());
        }
        if let Some(template) = &patch.selected_template {
            doc.selected_template = Some(template.clone());
        }
        doc.updated_at = Some(Utc::now());

        self.persist(&doc)?;
        Ok(Self::settings_from(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("site.json"))
    }

    #[test]
    fn test_missing_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.get_admin().unwrap().is_none());
        let settings = store.read_settings();
        assert_eq!(settings.site_name, "");
        assert_eq!(settings.selected_template, "");
    }

    #[test]
    fn test_malformed_document_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(path);
        assert!(store.get_admin().unwrap().is_none());
        assert_eq!(store.read_settings().site_name, "");
    }

    #[test]
    fn test_put_admin_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let admin = store.put_admin("root", "hashed-secret").unwrap();
        assert_eq!(admin.id, 1);
        assert_eq!(admin.roles, vec!["admin".to_string()]);

        let loaded = store.get_admin().unwrap().unwrap();
        assert_eq!(loaded.username, "root");
        assert_eq!(loaded.secret, "hashed-secret");
        assert!(loaded.updated_at.is_some());
    }

    #[test]
    fn test_admin_absent_when_secret_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.json");
        fs::write(&path, r#"{"username": "root", "password": ""}"#).unwrap();

        let store = FileStore::new(path);
        assert!(store.get_admin().unwrap().is_none());
    }

    #[test]
    fn test_settings_merge_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .update_settings(&SettingsPatch {
                site_name: Some("A".to_string()),
                ..Default::default()
            })
            .unwrap();
        store
            .update_settings(&SettingsPatch {
                site_keywords: Some("B".to_string()),
                ..Default::default()
            })
            .unwrap();

        let settings = store.read_settings();
        assert_eq!(settings.site_name, "A");
        assert_eq!(settings.site_keywords, "B");
    }

    #[test]
    fn test_settings_write_preserves_admin() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.put_admin("root", "secret").unwrap();
        store
            .update_settings(&SettingsPatch {
                site_name: Some("My Site".to_string()),
                selected_template: Some("t1".to_string()),
                ..Default::default()
            })
            .unwrap();

        let admin = store.get_admin().unwrap().unwrap();
        assert_eq!(admin.username, "root");
        assert_eq!(admin.secret, "secret");

        let settings = store.read_settings();
        assert_eq!(settings.site_name, "My Site");
        assert_eq!(settings.selected_template, "t1");
    }

    #[test]
    fn test_admin_write_preserves_settings() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .update_settings(&SettingsPatch {
                site_name: Some("My Site".to_string()),
                ..Default::default()
            })
            .unwrap();
        store.put_admin("root", "secret").unwrap();

        assert_eq!(store.read_settings().site_name, "My Site");
    }

    #[test]
    fn test_no_leftover_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put_admin("root", "secret").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["site.json".to_string()]);
    }
}
