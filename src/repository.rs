use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::AuthEvent;
use crate::error::{AtsError, Result};
use crate::files::{resume_object_name, validate_resume};
use crate::models::{
    Application, ApplicationDraft, ApplicationPatch, NewApplication, ResumeRef, ResumeSource, User,
};
use crate::store::{FileStorage, RecordStore};

/// Identifies one issued load. Results from tickets older than the last applied load
/// (or issued before a clear) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    owner_id: i64,
}

/// In-memory copy of the signed-in owner's applications, kept in step with the record
/// store. Every mutation writes the store's returned row into the cache, never the
/// locally submitted values.
pub struct ApplicationRepository<'a> {
    store: &'a dyn RecordStore,
    files: &'a dyn FileStorage,
    owner: Option<User>,
    applications: Vec<Application>,
    error: Option<String>,
    issued: u64,
    applied: u64,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(store: &'a dyn RecordStore, files: &'a dyn FileStorage) -> Self {
        Self {
            store,
            files,
            owner: None,
            applications: Vec::new(),
            error: None,
            issued: 0,
            applied: 0,
        }
    }

    pub fn owner(&self) -> Option<&User> {
        self.owner.as_ref()
    }

    /// Newest first.
    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn get(&self, id: i64) -> Option<&Application> {
        self.applications.iter().find(|app| app.id == id)
    }

    /// Message of the last failed load, if the cache is empty because of it.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn handle_auth_event(&mut self, event: &AuthEvent) -> Result<()> {
        match event {
            AuthEvent::SignedIn(user) => self.load(user.clone()),
            AuthEvent::SignedOut => {
                self.clear();
                Ok(())
            }
        }
    }

    /// Replace the cache with the store's records for `owner`.
    pub fn load(&mut self, owner: User) -> Result<()> {
        let ticket = self.begin_load(owner);
        let result = self.store.list(ticket.owner_id);
        self.finish_load(ticket, result)
    }

    pub fn refresh(&mut self) -> Result<()> {
        let owner = self.require_owner()?.clone();
        self.load(owner)
    }

    pub fn begin_load(&mut self, owner: User) -> LoadTicket {
        self.issued += 1;
        let ticket = LoadTicket {
            seq: self.issued,
            owner_id: owner.id,
        };
        self.owner = Some(owner);
        ticket
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Vec<Application>>) -> Result<()> {
        let same_owner = self.owner.as_ref().is_some_and(|o| o.id == ticket.owner_id);
        if ticket.seq <= self.applied || !same_owner {
            debug!(seq = ticket.seq, applied = self.applied, "discarding stale load");
            return Ok(());
        }
        self.applied = ticket.seq;

        match result {
            Ok(mut apps) => {
                apps.retain(|app| app.owner_id == ticket.owner_id);
                apps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                info!(owner_id = ticket.owner_id, count = apps.len(), "loaded applications");
                self.applications = apps;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                let err = e.into_fetch();
                warn!(owner_id = ticket.owner_id, "load failed: {}", err);
                self.applications.clear();
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Forget owner and records. Loads still in flight become stale.
    pub fn clear(&mut self) {
        self.owner = None;
        self.applications.clear();
        self.error = None;
        self.applied = self.issued;
    }

    pub fn add(&mut self, new: NewApplication) -> Result<Application> {
        let owner_id = self.require_owner()?.id;
        new.validate()?;

        let resume = match new.resume {
            None => None,
            Some(ResumeSource::Link { url, file_name }) => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    None
                } else {
                    Some(ResumeRef {
                        url,
                        file_path: None,
                        file_name: file_name.filter(|n| !n.trim().is_empty()),
                        file_size: None,
                    })
                }
            }
            Some(ResumeSource::Upload(upload)) => {
                validate_resume(&upload)?;
                let object_name = resume_object_name(&new.candidate_name, Utc::now());
                let stored = self
                    .files
                    .store(owner_id, &upload.bytes, &object_name)
                    .map_err(|e| AtsError::Persistence(format!("failed to upload resume file: {}", e)))?;
                Some(ResumeRef {
                    url: stored.public_reference,
                    file_path: Some(stored.locator),
                    file_name: Some(upload.file_name),
                    file_size: Some(upload.bytes.len() as i64),
                })
            }
        };

        let draft = ApplicationDraft {
            owner_id,
            candidate_name: new.candidate_name,
            role: new.role,
            experience_years: new.experience_years,
            status: new.status,
            resume,
        };
        let created = match self.store.insert(&draft) {
            Ok(created) => created,
            Err(e) => {
                // No record refers to the upload.
                if let Some(path) = draft.resume.as_ref().and_then(|r| r.file_path.as_deref()) {
                    if let Err(cleanup) = self.files.remove(path) {
                        warn!(path, "failed to remove orphaned resume: {}", cleanup);
                    }
                }
                return Err(e.into_persistence());
            }
        };
        info!(id = created.id, owner_id, "added application");

        self.applications.retain(|app| app.id != created.id);
        self.applications.insert(0, created.clone());
        Ok(created)
    }

    pub fn update(&mut self, id: i64, patch: ApplicationPatch) -> Result<Application> {
        let owner_id = self.require_owner()?.id;
        patch.validate()?;

        let updated = self
            .store
            .update(id, owner_id, &patch)
            .map_err(AtsError::into_persistence)?;
        info!(id, status = %updated.status, "updated application");

        if let Some(slot) = self.applications.iter_mut().find(|app| app.id == id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    pub fn delete(&mut self, id: i64) -> Result<()> {
        let owner_id = self.require_owner()?.id;
        self.store.delete(id, owner_id).map_err(AtsError::into_persistence)?;
        info!(id, owner_id, "deleted application");
        self.applications.retain(|app| app.id != id);
        Ok(())
    }

    fn require_owner(&self) -> Result<&User> {
        self.owner
            .as_ref()
            .ok_or_else(|| AtsError::Auth("sign in to manage applications".to_string()))
    }
}
