use anyhow::{Context, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AtsError, Result};
use crate::models::{Application, ApplicationDraft, ApplicationPatch, ResumeRef, Stage, User};
use crate::store::RecordStore;

const APPLICATION_COLUMNS: &str = "id, user_id, candidate_name, role, experience_years, status,
     resume_link, resume_file_path, resume_file_name, resume_file_size, created_at, updated_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Stored credentials for one user.
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
    pub salt: String,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory database");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init().expect("schema");
        db
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                candidate_name TEXT NOT NULL CHECK (length(trim(candidate_name)) > 0),
                role TEXT NOT NULL CHECK (length(trim(role)) > 0),
                experience_years INTEGER NOT NULL DEFAULT 0 CHECK (experience_years BETWEEN 0 AND 50),
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interview', 'offer', 'rejected')),
                resume_link TEXT,
                resume_file_path TEXT,
                resume_file_name TEXT,
                resume_file_size INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_applications_user ON applications(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'ats init' first."));
        }
        Ok(())
    }

    // --- User operations ---

    pub fn create_user(&self, email: &str, password_hash: &str, salt: &str) -> Result<User> {
        let now = Utc::now();
        let result = self.conn.execute(
            "INSERT INTO users (email, password_hash, salt, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![email, password_hash, salt, timestamp(&now)],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(AtsError::Auth(format!("'{}' is already registered", email)));
            }
            Err(e) => return Err(e.into()),
        }
        self.find_credentials(email)?
            .map(|credentials| credentials.user)
            .ok_or_else(|| AtsError::Auth(format!("'{}' vanished after sign-up", email)))
    }

    pub fn find_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, email, created_at, password_hash, salt FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(Credentials {
                        user: User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            created_at: row.get(2)?,
                        },
                        password_hash: row.get(3)?,
                        salt: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    // --- Session operations ---

    pub fn create_session(&self, token: &str, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT u.id, u.email, u.created_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.token = ?1",
                [token],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(())
    }

    // --- Application operations ---

    fn get_application(&self, id: i64, owner_id: i64) -> Result<Option<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE id = ?1 AND user_id = ?2",
            APPLICATION_COLUMNS
        );
        let app = self
            .conn
            .query_row(&sql, params![id, owner_id], Self::row_to_application)
            .optional()?;
        Ok(app)
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
        let url: Option<String> = row.get(6)?;
        let resume = url.map(|url| -> rusqlite::Result<ResumeRef> {
            Ok(ResumeRef {
                url,
                file_path: row.get(7)?,
                file_name: row.get(8)?,
                file_size: row.get(9)?,
            })
        });
        Ok(Application {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            candidate_name: row.get(2)?,
            role: row.get(3)?,
            experience_years: row.get(4)?,
            status: row.get(5)?,
            resume: resume.transpose()?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl RecordStore for Database {
    fn list(&self, owner_id: i64) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            APPLICATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([owner_id], Self::row_to_application)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert(&self, draft: &ApplicationDraft) -> Result<Application> {
        let now = timestamp(&Utc::now());
        let resume = draft.resume.as_ref();
        self.conn.execute(
            "INSERT INTO applications (user_id, candidate_name, role, experience_years, status,
                resume_link, resume_file_path, resume_file_name, resume_file_size, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                draft.owner_id,
                draft.candidate_name.trim(),
                draft.role.trim(),
                draft.experience_years,
                draft.status,
                resume.map(|r| r.url.as_str()),
                resume.and_then(|r| r.file_path.as_deref()),
                resume.and_then(|r| r.file_name.as_deref()),
                resume.and_then(|r| r.file_size),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, owner_id = draft.owner_id, "inserted application");
        self.get_application(id, draft.owner_id)?
            .ok_or_else(|| AtsError::Persistence(format!("application #{} vanished after insert", id)))
    }

    fn update(&self, id: i64, owner_id: i64, patch: &ApplicationPatch) -> Result<Application> {
        let mut sets: Vec<String> = vec![];
        let mut values: Vec<Box<dyn ToSql>> = vec![];

        if let Some(name) = &patch.candidate_name {
            values.push(Box::new(name.trim().to_string()));
            sets.push(format!("candidate_name = ?{}", values.len()));
        }
        if let Some(role) = &patch.role {
            values.push(Box::new(role.trim().to_string()));
            sets.push(format!("role = ?{}", values.len()));
        }
        if let Some(years) = patch.experience_years {
            values.push(Box::new(years));
            sets.push(format!("experience_years = ?{}", values.len()));
        }
        if let Some(status) = patch.status {
            values.push(Box::new(status));
            sets.push(format!("status = ?{}", values.len()));
        }
        if let Some(resume) = &patch.resume {
            let columns: [(&str, Box<dyn ToSql>); 4] = [
                ("resume_link", Box::new(resume.url.clone())),
                ("resume_file_path", Box::new(resume.file_path.clone())),
                ("resume_file_name", Box::new(resume.file_name.clone())),
                ("resume_file_size", Box::new(resume.file_size)),
            ];
            for (column, value) in columns {
                values.push(value);
                sets.push(format!("{} = ?{}", column, values.len()));
            }
        }

        values.push(Box::new(timestamp(&Utc::now())));
        sets.push(format!("updated_at = ?{}", values.len()));

        values.push(Box::new(id));
        let id_param = values.len();
        values.push(Box::new(owner_id));
        let owner_param = values.len();

        let sql = format!(
            "UPDATE applications SET {} WHERE id = ?{} AND user_id = ?{}",
            sets.join(", "),
            id_param,
            owner_param
        );
        let changed = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(AtsError::NotFound(id));
        }
        self.get_application(id, owner_id)?.ok_or(AtsError::NotFound(id))
    }

    fn delete(&self, id: i64, owner_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM applications WHERE id = ?1 AND user_id = ?2",
            params![id, owner_id],
        )?;
        if changed == 0 {
            return Err(AtsError::NotFound(id));
        }
        Ok(())
    }
}

/// Fixed-width RFC 3339 so lexical order in SQLite matches chronological order.
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ToSql for Stage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Stage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: AtsError| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, email: &str) -> User {
        db.create_user(email, "hash", "salt").unwrap()
    }

    fn draft(owner_id: i64, name: &str) -> ApplicationDraft {
        ApplicationDraft {
            owner_id,
            candidate_name: name.to_string(),
            role: "Backend Developer".to_string(),
            experience_years: 4,
            status: Stage::Applied,
            resume: None,
        }
    }

    #[test]
    fn insert_assigns_id_and_timestamps() {
        let db = Database::open_in_memory();
        let owner = user(&db, "a@example.com");
        let app = db.insert(&draft(owner.id, "  Ada  ")).unwrap();
        assert!(app.id > 0);
        assert_eq!(app.candidate_name, "Ada");
        assert_eq!(app.status, Stage::Applied);
        assert_eq!(app.created_at, app.updated_at);
        assert!(app.resume.is_none());
    }

    #[test]
    fn list_is_scoped_and_newest_first() {
        let db = Database::open_in_memory();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let first = db.insert(&draft(a.id, "First")).unwrap();
        let second = db.insert(&draft(a.id, "Second")).unwrap();
        db.insert(&draft(b.id, "Other")).unwrap();

        let ids: Vec<i64> = db.list(a.id).unwrap().iter().map(|app| app.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(db.list(b.id).unwrap().len(), 1);
    }

    #[test]
    fn update_patches_fields_and_refreshes_updated_at() {
        let db = Database::open_in_memory();
        let owner = user(&db, "a@example.com");
        let app = db.insert(&draft(owner.id, "Ada")).unwrap();

        let patch = ApplicationPatch {
            status: Some(Stage::Offer),
            experience_years: Some(6),
            resume: Some(ResumeRef {
                url: "https://cv.example.com/ada.pdf".to_string(),
                file_path: None,
                file_name: Some("ada.pdf".to_string()),
                file_size: None,
            }),
            ..Default::default()
        };
        let updated = db.update(app.id, owner.id, &patch).unwrap();
        assert_eq!(updated.status, Stage::Offer);
        assert_eq!(updated.experience_years, 6);
        assert_eq!(updated.candidate_name, "Ada");
        assert_eq!(updated.resume.unwrap().file_name.as_deref(), Some("ada.pdf"));
        assert!(updated.updated_at >= app.updated_at);
        assert_eq!(updated.created_at, app.created_at);
    }

    #[test]
    fn cross_owner_access_is_not_found() {
        let db = Database::open_in_memory();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let app = db.insert(&draft(a.id, "Ada")).unwrap();

        let err = db.update(app.id, b.id, &ApplicationPatch::status(Stage::Offer)).unwrap_err();
        assert!(matches!(err, AtsError::NotFound(id) if id == app.id));
        assert!(matches!(db.delete(app.id, b.id), Err(AtsError::NotFound(_))));
        assert_eq!(db.list(a.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let db = Database::open_in_memory();
        let owner = user(&db, "a@example.com");
        let app = db.insert(&draft(owner.id, "Ada")).unwrap();
        db.delete(app.id, owner.id).unwrap();
        assert!(matches!(db.delete(app.id, owner.id), Err(AtsError::NotFound(_))));
    }

    #[test]
    fn schema_rejects_unknown_status() {
        let db = Database::open_in_memory();
        let owner = user(&db, "a@example.com");
        let now = timestamp(&Utc::now());
        let result = db.conn.execute(
            "INSERT INTO applications (user_id, candidate_name, role, status, created_at, updated_at)
             VALUES (?1, 'Ada', 'Eng', 'hired', ?2, ?2)",
            params![owner.id, now],
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_email_is_auth_error() {
        let db = Database::open_in_memory();
        user(&db, "a@example.com");
        let err = db.create_user("a@example.com", "h", "s").unwrap_err();
        assert!(matches!(err, AtsError::Auth(_)));
    }

    #[test]
    fn sessions_resolve_to_users() {
        let db = Database::open_in_memory();
        let owner = user(&db, "a@example.com");
        db.create_session("tok", owner.id).unwrap();
        assert_eq!(db.session_user("tok").unwrap(), Some(owner));
        db.delete_session("tok").unwrap();
        assert_eq!(db.session_user("tok").unwrap(), None);
    }
}
