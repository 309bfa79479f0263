use lambda_http::http::StatusCode;
use thiserror::Error;

pub type AtomResult<T> = Result<T, AtomError>;

/// Errors shared by every atom service and store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtomError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("category {category} is out of stock")]
    OutOfStock { category: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),
}

impl AtomError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Store(format!("{}: {}", context, err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OutOfStock { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
