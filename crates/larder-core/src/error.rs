//! Error types for Larder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Coarse classification used by callers to decide how to report a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The extraction service failed or returned unusable output
    Extraction,
    /// A well-formed request that cannot be applied as given
    Validation,
    /// Any failure of the backing store
    Persistence,
    NotFound,
    Conflict,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(_) | Self::Http(_) => ErrorKind::Extraction,
            Self::Validation(_) | Self::InvalidData(_) => ErrorKind::Validation,
            Self::Database(_) | Self::Pool(_) | Self::Encryption(_) | Self::Io(_) => {
                ErrorKind::Persistence
            }
            Self::Duplicate(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::Extraction("bad json".into()).kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            Error::Validation("no items".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::Database(rusqlite::Error::QueryReturnedNoRows).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(Error::Duplicate("seen".into()).kind(), ErrorKind::Conflict);
    }
}
