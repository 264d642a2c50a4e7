use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtsError>;

#[derive(Debug, Error)]
pub enum AtsError {
    /// Bad input caught before any store call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// No signed-in owner, or bad credentials.
    #[error("authentication required: {0}")]
    Auth(String),

    /// Id absent or owned by someone else.
    #[error("application #{0} not found")]
    NotFound(i64),

    #[error("failed to save application: {0}")]
    Persistence(String),

    #[error("failed to fetch applications: {0}")]
    Fetch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtsError {
    /// Normalise a store failure raised during a mutation. Errors that already carry
    /// meaning for the caller pass through untouched.
    pub fn into_persistence(self) -> Self {
        match self {
            AtsError::NotFound(_) | AtsError::Validation(_) | AtsError::Auth(_) => self,
            AtsError::Persistence(_) => self,
            other => AtsError::Persistence(other.to_string()),
        }
    }

    pub fn into_fetch(self) -> Self {
        match self {
            AtsError::Fetch(_) => self,
            other => AtsError::Fetch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_keeps_not_found() {
        let err = AtsError::NotFound(7).into_persistence();
        assert!(matches!(err, AtsError::NotFound(7)));
    }

    #[test]
    fn persistence_wraps_database_errors() {
        let err = AtsError::Database(rusqlite::Error::QueryReturnedNoRows).into_persistence();
        assert!(matches!(err, AtsError::Persistence(_)));
    }

    #[test]
    fn fetch_wraps_io_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "offline");
        let err = AtsError::Io(io).into_fetch();
        match err {
            AtsError::Fetch(msg) => assert!(msg.contains("offline")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
