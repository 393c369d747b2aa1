//! Crate-wide error type and result alias

use hyper::StatusCode;
use thiserror::Error;

/// Errors surfaced by Bookworm services and routes
#[derive(Debug, Error)]
pub enum BookwormError {
    /// Malformed or missing input (e.g. a non-positive reading-goal target)
    #[error("{0}")]
    Validation(String),

    /// Referenced user/book/library entry does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Store read or write failed; terminal for the request
    #[error("Database error: {0}")]
    Database(String),

    /// Missing or invalid credentials
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BookwormError {
    /// HTTP status the error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookwormError::Validation(_) => StatusCode::BAD_REQUEST,
            BookwormError::NotFound(_) => StatusCode::NOT_FOUND,
            BookwormError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BookwormError::Auth(_) => StatusCode::UNAUTHORIZED,
            BookwormError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookwormError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BookwormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            BookwormError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookwormError::NotFound("Book".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BookwormError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BookwormError::Auth("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = BookwormError::NotFound("Review".into());
        assert_eq!(err.to_string(), "Review not found");
    }
}
