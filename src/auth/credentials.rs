use std::sync::Arc;

use super::password::{SecretHasher, constant_time_eq};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::AdminRecord;

const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_SECRET: &str = "admin";
pub const MIN_SECRET_LEN: usize = 6;

/// The single-admin credential component: bootstrap, lookup, verification
/// and rotation, on top of the shared document store.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn Store>,
    hasher: Arc<SecretHasher>,
}

impl Credentials {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            hasher: Arc::new(SecretHasher::new()),
        }
    }

    pub fn get_admin(&self) -> Result<Option<AdminRecord>> {
        self.store.get_admin()
    }

    pub fn is_configured(&self) -> Result<bool> {
        Ok(self.store.get_admin()?.is_some())
    }

    /// Creates the default admin account if none is configured. Idempotent.
    /// The default secret is stored hashed like any other.
    pub fn bootstrap_default(&self) -> Result<()> {
        if self.is_configured()? {
            return Ok(());
        }
        let hash = self.hasher.hash(DEFAULT_SECRET)?;
        self.store.put_admin(DEFAULT_USERNAME, &hash)?;
        tracing::warn!(
            "No admin account configured; created default '{DEFAULT_USERNAME}', change the password"
        );
        Ok(())
    }

    /// Upserts the admin account. The secret is hashed before it touches the
    /// store; settings fields in the shared document are preserved.
    pub fn set_admin(&self, username: &str, secret: &str) -> Result<AdminRecord> {
        if username.is_empty() || secret.is_empty() {
            return Err(Error::Validation(
                "Username or password is empty".to_string(),
            ));
        }
        let hash = self.hasher.hash(secret)?;
        self.store.put_admin(username, &hash)
    }

    /// Verifies a username/secret pair. Both comparisons are constant-time;
    /// hashed vs. legacy plaintext storage is handled by the hasher.
    pub fn verify_credentials(&self, username: &str, secret: &str) -> Result<Option<AdminRecord>> {
        let Some(admin) = self.store.get_admin()? else {
            return Ok(None);
        };

        let username_ok = constant_time_eq(username, &admin.username);
        let secret_ok = self.hasher.verify(secret, &admin.secret)?;

        if username_ok && secret_ok {
            Ok(Some(admin))
        } else {
            Ok(None)
        }
    }

    /// Rotates the password after verifying the current one. The rewrite
    /// always stores a hash, migrating legacy plaintext records.
    pub fn change_password(&self, current: &str, new: &str) -> Result<AdminRecord> {
        if current.is_empty() || new.is_empty() {
            return Err(Error::Validation(
                "Current or new password is empty".to_string(),
            ));
        }
        if new.len() < MIN_SECRET_LEN {
            return Err(Error::Validation(format!(
                "New password must be at least {MIN_SECRET_LEN} characters"
            )));
        }

        let admin = self
            .verify_credentials_any_user(current)?
            .ok_or_else(|| Error::Validation("Current password is incorrect".to_string()))?;

        self.set_admin(&admin.username, new)
    }

    /// Checks `secret` against the stored admin without a username match.
    /// Used by password rotation, where the caller is already authenticated.
    fn verify_credentials_any_user(&self, secret: &str) -> Result<Option<AdminRecord>> {
        let Some(admin) = self.store.get_admin()? else {
            return Ok(None);
        };
        if self.hasher.verify(secret, &admin.secret)? {
            Ok(Some(admin))
        } else {
            Ok(None)
        }
    }
}

/// Strips every character outside `[A-Za-z0-9_.-]` from a submitted
/// username.
#[must_use]
pub fn sanitize_username(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use tempfile::TempDir;

    fn credentials(dir: &TempDir) -> Credentials {
        Credentials::new(Arc::new(FileStore::new(dir.path().join("site.json"))))
    }

    #[test]
    fn test_bootstrap_default_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);

        creds.bootstrap_default().unwrap();
        let first = creds.get_admin().unwrap().unwrap();

        creds.bootstrap_default().unwrap();
        let second = creds.get_admin().unwrap().unwrap();

        assert_eq!(first.username, second.username);
        assert_eq!(first.secret, second.secret);
    }

    #[test]
    fn test_bootstrap_default_verifies_and_is_hashed() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);
        creds.bootstrap_default().unwrap();

        assert!(creds.verify_credentials("admin", "admin").unwrap().is_some());
        assert!(creds.verify_credentials("admin", "wrong").unwrap().is_none());
        assert!(creds.verify_credentials("other", "admin").unwrap().is_none());

        let stored = creds.get_admin().unwrap().unwrap();
        assert!(stored.secret.starts_with("$argon2id$"));
    }

    #[test]
    fn test_set_admin_rejects_empty_fields() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);

        assert!(matches!(
            creds.set_admin("", "secret1"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            creds.set_admin("root", ""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_change_password_scenario() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);
        creds.bootstrap_default().unwrap();

        assert!(creds.verify_credentials("admin", "admin").unwrap().is_some());
        creds.change_password("admin", "newpass1").unwrap();
        assert!(creds.verify_credentials("admin", "admin").unwrap().is_none());
        assert!(
            creds
                .verify_credentials("admin", "newpass1")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_change_password_rejects_wrong_current() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);
        creds.bootstrap_default().unwrap();

        assert!(matches!(
            creds.change_password("wrong", "newpass1"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_change_password_rejects_short_secret() {
        let dir = TempDir::new().unwrap();
        let creds = credentials(&dir);
        creds.bootstrap_default().unwrap();

        assert!(matches!(
            creds.change_password("admin", "abc"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_legacy_plaintext_document_migrates_on_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.json");
        std::fs::write(&path, r#"{"username": "admin", "password": "oldpw"}"#).unwrap();

        let creds = Credentials::new(Arc::new(FileStore::new(path)));
        assert!(creds.verify_credentials("admin", "oldpw").unwrap().is_some());

        creds.change_password("oldpw", "newpass1").unwrap();
        let stored = creds.get_admin().unwrap().unwrap();
        assert!(stored.secret.starts_with("$argon2id$"));
        assert!(
            creds
                .verify_credentials("admin", "newpass1")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("ad.min_1-x"), "ad.min_1-x");
        assert_eq!(sanitize_username("ad min<script>"), "adminscript");
        assert_eq!(sanitize_username("../root"), "..root");
    }
}
