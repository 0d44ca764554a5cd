//! Error types for the storage and domain layers.

use thiserror::Error;

/// Errors raised below the IPC layer.
///
/// Each variant carries a stable machine code (see [`Error::code`]) that the
/// IPC layer copies into the response envelope.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid configuration: {message}")]
    ConfigValidation { message: String },
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "db_query_failed",
            Self::NotFound { .. } => "not_found",
            Self::Invalid(_) => "bad_params",
            Self::Conflict(_) => "conflict",
            Self::Io(_) => "io_failed",
            Self::Config(_) | Self::ConfigValidation { .. } => "bad_config",
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::not_found("student", "s1").code(), "not_found");
        assert_eq!(Error::invalid("x").code(), "bad_params");
        assert_eq!(Error::conflict("x").code(), "conflict");
        assert_eq!(
            Error::Db(rusqlite::Error::QueryReturnedNoRows).code(),
            "db_query_failed"
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let e = Error::not_found("leave request", "abc");
        assert_eq!(e.to_string(), "leave request not found: abc");
    }
}
