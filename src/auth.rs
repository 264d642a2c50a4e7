use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{AtsError, Result};
use crate::models::User;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    user_id: i64,
}

/// Local auth provider: users and sessions live in the database, the active session token
/// in a small JSON file so separate invocations share one sign-in.
pub struct AuthService<'a> {
    db: &'a Database,
    session_file: PathBuf,
    subscribers: RefCell<Vec<Sender<AuthEvent>>>,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a Database, session_file: impl Into<PathBuf>) -> Self {
        Self {
            db,
            session_file: session_file.into(),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Change notifications for sign-in and sign-out.
    pub fn subscribe(&self) -> Receiver<AuthEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    pub fn current_user(&self) -> Result<Option<User>> {
        let Some(session) = self.read_session()? else {
            return Ok(None);
        };
        let user = self.db.session_user(&session.token)?;
        if user.is_none() {
            warn!("session file refers to an unknown session; ignoring it");
        }
        Ok(user.filter(|u| u.id == session.user_id))
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AtsError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let salt = random_hex(16);
        let user = self.db.create_user(&email, &hash_password(&salt, password), &salt)?;
        info!(user_id = user.id, email = %user.email, "signed up");
        self.sign_in(&email, password)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let credentials = self
            .db
            .find_credentials(&email)?
            .filter(|c| c.password_hash == hash_password(&c.salt, password))
            .ok_or_else(|| AtsError::Auth("invalid email or password".to_string()))?;

        if let Some(previous) = self.read_session()? {
            self.db.delete_session(&previous.token)?;
        }

        let token = random_hex(32);
        self.db.create_session(&token, credentials.user.id)?;
        let session = SessionFile {
            token,
            user_id: credentials.user.id,
        };
        if let Some(parent) = self.session_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&session)
            .map_err(|e| AtsError::Auth(format!("could not encode session: {}", e)))?;
        fs::write(&self.session_file, json)?;

        info!(user_id = credentials.user.id, "signed in");
        self.notify(AuthEvent::SignedIn(credentials.user.clone()));
        Ok(credentials.user)
    }

    pub fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.read_session()? {
            self.db.delete_session(&session.token)?;
        }
        match fs::remove_file(&self.session_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("signed out");
        self.notify(AuthEvent::SignedOut);
        Ok(())
    }

    fn read_session(&self) -> Result<Option<SessionFile>> {
        let raw = match fs::read_to_string(&self.session_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("ignoring unreadable session file: {}", e);
                Ok(None)
            }
        }
    }

    fn notify(&self, event: AuthEvent) {
        // Drop subscribers whose receiver has gone away.
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AtsError::Validation(format!("'{}' is not an email address", email)));
    }
    Ok(email)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service<'a>(db: &'a Database, dir: &tempfile::TempDir) -> AuthService<'a> {
        AuthService::new(db, dir.path().join("session.json"))
    }

    #[test]
    fn sign_up_signs_in_and_persists_session() {
        let db = Database::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        let auth = service(&db, &dir);

        let user = auth.sign_up("  Ada@Example.com ", "secret1").unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(auth.current_user().unwrap(), Some(user.clone()));

        // A second service over the same files sees the same session.
        let other = service(&db, &dir);
        assert_eq!(other.current_user().unwrap(), Some(user));
    }

    #[test]
    fn rejects_short_password_and_bad_email() {
        let db = Database::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        let auth = service(&db, &dir);
        assert!(matches!(auth.sign_up("a@b.c", "12345"), Err(AtsError::Validation(_))));
        assert!(matches!(auth.sign_up("nobody", "123456"), Err(AtsError::Validation(_))));
    }

    #[test]
    fn wrong_password_is_auth_error() {
        let db = Database::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        let auth = service(&db, &dir);
        auth.sign_up("a@b.c", "correct horse").unwrap();
        auth.sign_out().unwrap();

        assert!(matches!(auth.sign_in("a@b.c", "wrong"), Err(AtsError::Auth(_))));
        assert!(matches!(auth.sign_in("x@b.c", "correct horse"), Err(AtsError::Auth(_))));
        assert_eq!(auth.current_user().unwrap(), None);
    }

    #[test]
    fn subscribers_see_sign_in_and_out() {
        let db = Database::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        let auth = service(&db, &dir);
        let events = auth.subscribe();

        let user = auth.sign_up("a@b.c", "secret1").unwrap();
        auth.sign_out().unwrap();

        let seen: Vec<AuthEvent> = events.try_iter().collect();
        assert_eq!(seen, vec![AuthEvent::SignedIn(user), AuthEvent::SignedOut]);
        assert_eq!(auth.current_user().unwrap(), None);
    }

    #[test]
    fn password_hash_is_salted_sha256_hex() {
        let hash = hash_password("salt", "secret1");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, format!("{:x}", Sha256::digest(b"saltsecret1")));
        assert_ne!(hash, hash_password("other", "secret1"));
        assert_eq!(random_hex(16).len(), 32);
    }

    #[test]
    fn sign_out_without_session_is_fine() {
        let db = Database::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        assert!(service(&db, &dir).sign_out().is_ok());
    }
}
