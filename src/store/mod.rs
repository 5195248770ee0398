mod file;

pub use file::FileStore;

use crate::error::Result;
use crate::types::{AdminRecord, SettingsPatch, SiteSettings};

/// Store defines the persistence interface for the single on-disk document
/// holding both the admin record and the site settings.
///
/// Every write is a read-merge-write: updating one sub-object must preserve
/// all fields of the other. Implementations serialize writers so readers
/// never observe a partially written document.
pub trait Store: Send + Sync {
    /// Reads the admin record. `None` if the document is missing, unparseable,
    /// or has an empty secret.
    fn get_admin(&self) -> Result<Option<AdminRecord>>;

    /// Upserts the admin record, preserving settings fields. `secret` is
    /// stored as given; hashing happens in the auth layer.
    fn put_admin(&self, username: &str, secret: &str) -> Result<AdminRecord>;

    /// Reads the site settings. Lenient: a missing or malformed document
    /// yields defaults rather than an error.
    fn read_settings(&self) -> SiteSettings;

    /// Overlays the `Some` fields of `patch` onto the stored document and
    /// stamps `updated_at`. Field validation happens before this is called.
    fn update_settings(&self, patch: &SettingsPatch) -> Result<SiteSettings>;
}
