use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use jiseti_db::UniqueViolation;
use jiseti_types::models::RecordStatus;

/// Every failure a request can end in. Each variant maps to one status code
/// and one stable `code` string; the message is for humans.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // -- Validation (400) --
    #[error("{} is required", capitalize(.0))]
    MissingField(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Only {0} email addresses are accepted")]
    InvalidDomain(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error(
        "Invalid coordinates: latitude must be within [-90, 90], longitude within [-180, 180], and both given together"
    )]
    InvalidCoordinates,

    #[error("Invalid {0} URL: expected an absolute http or https URL")]
    InvalidMediaUrl(&'static str),

    #[error("Invalid status '{0}'")]
    InvalidStatus(String),

    #[error("Invalid record type '{0}'")]
    InvalidRecordType(String),

    #[error("Invalid vote type '{0}'")]
    InvalidVoteType(String),

    #[error("Malformed request: {0}")]
    MalformedBody(String),

    // -- Authentication (401) --
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing or invalid access token")]
    Unauthenticated,

    // -- Authorization (403) --
    #[error("You do not have access to this record")]
    Forbidden,

    #[error("{0}")]
    RoleForbidden(&'static str),

    #[error("Cannot {0} finalized record")]
    FinalizedRecord(&'static str),

    #[error("Draft records cannot be voted on")]
    RecordNotVotable,

    #[error("Record is already {0}; its status can no longer change")]
    RecordClosed(RecordStatus),

    // -- Not found (404) --
    #[error("{0} not found")]
    NotFound(&'static str),

    // -- Conflict (400 on signup) --
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Admin number already registered")]
    DuplicateAdminNumber,

    #[error("Internal server error")]
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::InvalidEmail
            | Self::InvalidDomain(_)
            | Self::WeakPassword(_)
            | Self::InvalidCoordinates
            | Self::InvalidMediaUrl(_)
            | Self::InvalidStatus(_)
            | Self::InvalidRecordType(_)
            | Self::InvalidVoteType(_)
            | Self::MalformedBody(_)
            | Self::DuplicateEmail
            | Self::DuplicateAdminNumber => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden
            | Self::RoleForbidden(_)
            | Self::FinalizedRecord(_)
            | Self::RecordNotVotable
            | Self::RecordClosed(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidDomain(_) => "invalid_domain",
            Self::WeakPassword(_) => "weak_password",
            Self::InvalidCoordinates => "invalid_coordinates",
            Self::InvalidMediaUrl(_) => "invalid_media_url",
            Self::InvalidStatus(_) => "invalid_status",
            Self::InvalidRecordType(_) => "invalid_record_type",
            Self::InvalidVoteType(_) => "invalid_vote_type",
            Self::MalformedBody(_) => "malformed_body",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::RoleForbidden(_) => "role_forbidden",
            Self::FinalizedRecord(_) => "finalized_record",
            Self::RecordNotVotable => "record_not_votable",
            Self::RecordClosed(_) => "record_closed",
            Self::NotFound(_) => "not_found",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateAdminNumber => "duplicate_admin_number",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            error!("Internal error: {:#}", e);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Store errors arrive as `anyhow`. Unique violations become the matching
/// conflict; anything else is internal and never shown to the caller.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<UniqueViolation>() {
            Some(v) if v.column.ends_with(".email") => Self::DuplicateEmail,
            Some(v) if v.is_on("administrators.admin_number") => Self::DuplicateAdminNumber,
            _ => Self::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

/// True when `err` is a unique violation on exactly `column`.
pub(crate) fn is_violation_on(err: &anyhow::Error, column: &str) -> bool {
    err.downcast_ref::<UniqueViolation>()
        .is_some_and(|v| v.is_on(column))
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_reads_naturally() {
        assert_eq!(ApiError::MissingField("title").to_string(), "Title is required");
        assert_eq!(ApiError::MissingField("vote_type").to_string(), "Vote type is required");
    }

    #[test]
    fn unique_violations_translate_to_conflicts() {
        let email: anyhow::Error = UniqueViolation {
            column: "normal_users.email".into(),
        }
        .into();
        assert!(matches!(ApiError::from(email), ApiError::DuplicateEmail));

        let number: anyhow::Error = UniqueViolation {
            column: "administrators.admin_number".into(),
        }
        .into();
        assert!(matches!(ApiError::from(number), ApiError::DuplicateAdminNumber));

        let other = anyhow::anyhow!("disk full");
        let err = ApiError::from(other);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(ApiError::InvalidCoordinates.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::FinalizedRecord("edit").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("Record").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::DuplicateEmail.code(), "duplicate_email");
    }
}
