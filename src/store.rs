use crate::error::Result;
use crate::models::{Application, ApplicationDraft, ApplicationPatch};

// --- Record store ---

/// Persistent application records, always scoped by owner. Implementations must reject
/// cross-owner access with `AtsError::NotFound`.
pub trait RecordStore {
    /// Every record of `owner_id`, newest `created_at` first.
    fn list(&self, owner_id: i64) -> Result<Vec<Application>>;

    /// Persist a new record; the store assigns id and both timestamps.
    fn insert(&self, draft: &ApplicationDraft) -> Result<Application>;

    /// Apply `patch`, refresh `updated_at`, and return the stored row.
    fn update(&self, id: i64, owner_id: i64, patch: &ApplicationPatch) -> Result<Application>;

    fn delete(&self, id: i64, owner_id: i64) -> Result<()>;
}

// --- File storage ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path inside the storage area, e.g. `3/1700000000000_Ada_resume.pdf`.
    pub locator: String,
    /// Reference a reader can open.
    pub public_reference: String,
}

pub trait FileStorage {
    fn store(&self, owner_id: i64, bytes: &[u8], file_name: &str) -> Result<StoredFile>;

    /// Delete a previously stored object. A missing object is not an error.
    fn remove(&self, locator: &str) -> Result<()>;
}
