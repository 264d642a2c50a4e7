use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

use crate::error::{AtsError, Result};
use crate::models::ResumeUpload;
use crate::store::{FileStorage, StoredFile};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Checks run before any storage call: one PDF document, at most 5 MiB.
pub fn validate_resume(upload: &ResumeUpload) -> Result<()> {
    let is_pdf_name = Path::new(&upload.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf_name {
        return Err(AtsError::Validation(format!(
            "resume '{}' must be a PDF file",
            upload.file_name
        )));
    }
    if upload.bytes.is_empty() {
        return Err(AtsError::Validation("resume file is empty".to_string()));
    }
    if upload.bytes.len() > MAX_RESUME_BYTES {
        return Err(AtsError::Validation(format!(
            "resume is {} bytes; the limit is 5 MB",
            upload.bytes.len()
        )));
    }
    if !upload.bytes.starts_with(PDF_MAGIC) {
        return Err(AtsError::Validation(format!(
            "resume '{}' is not a PDF document",
            upload.file_name
        )));
    }
    Ok(())
}

/// Storage name for a candidate's resume: `<millis>_<name>_resume.pdf`.
pub fn resume_object_name(candidate_name: &str, at: DateTime<Utc>) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("static regex"));
    format!(
        "{}_{}_resume.pdf",
        at.timestamp_millis(),
        re.replace_all(candidate_name.trim(), "_")
    )
}

/// Resume storage on the local filesystem, one directory per owner.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStorage for LocalFileStorage {
    fn store(&self, owner_id: i64, bytes: &[u8], file_name: &str) -> Result<StoredFile> {
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Err(AtsError::Validation(format!("invalid storage name '{}'", file_name)));
        }
        let dir = self.root.join(owner_id.to_string());
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);

        // Never overwrite an existing object.
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AtsError::Persistence(format!("'{}' already exists", file_name)));
            }
            Err(e) => return Err(e.into()),
        };
        std::io::Write::write_all(&mut file, bytes)?;

        let absolute = fs::canonicalize(&path)?;
        info!(owner_id, path = %absolute.display(), size = bytes.len(), "stored resume");
        Ok(StoredFile {
            locator: format!("{}/{}", owner_id, file_name),
            public_reference: format!("file://{}", absolute.display()),
        })
    }

    fn remove(&self, locator: &str) -> Result<()> {
        let valid = matches!(
            locator.split_once('/'),
            Some((owner, name)) if owner.parse::<i64>().is_ok()
                && !name.is_empty()
                && !name.contains(['/', '\\'])
                && !name.starts_with('.')
        );
        if !valid {
            return Err(AtsError::Validation(format!("invalid storage locator '{}'", locator)));
        }
        match fs::remove_file(self.root.join(locator)) {
            Ok(()) => {
                info!(locator, "removed resume");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
