use rusqlite::{ErrorCode, ffi};

/// A unique constraint rejected a write. `column` is SQLite's
/// `table.column` label, e.g. `normal_users.email`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unique constraint violated on {column}")]
pub struct UniqueViolation {
    pub column: String,
}

impl UniqueViolation {
    pub fn is_on(&self, column: &str) -> bool {
        self.column == column
    }
}

/// Lift unique violations into [`UniqueViolation`] so callers can downcast;
/// everything else passes through untouched.
pub(crate) fn translate(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
        let unique = failure.code == ErrorCode::ConstraintViolation
            && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY);
        if unique {
            if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
                return UniqueViolation {
                    column: columns.to_string(),
                }
                .into();
            }
        }
    }
    err.into()
}
