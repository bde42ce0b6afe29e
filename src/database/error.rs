use crate::payments::error::PaymentError;
use std::fmt;

/// What went wrong at the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    NotFound { entity: String, id: String },
    Conflict { message: String },
    ConnectionFailed { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::ConnectionFailed {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseErrorKind::Conflict {
                message: db.message().to_string(),
            },
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_connection_failure(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::ConnectionFailed { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => write!(f, "{} not found: {}", entity, id),
            DatabaseErrorKind::Conflict { message } => write!(f, "conflict: {}", message),
            DatabaseErrorKind::ConnectionFailed { message } => {
                write!(f, "database connection failed: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for PaymentError {
    fn from(err: DatabaseError) -> Self {
        PaymentError::Store {
            message: err.to_string(),
        }
    }
}
