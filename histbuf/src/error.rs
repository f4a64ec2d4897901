//! Error types for histbuf operations
//!
//! Format-level failures are [`HistError`]s from `histbuf-core`; this
//! wrapper adds the I/O failures that only exist once files are involved.

use histbuf_core::{ErrorCategory, HistError};

/// Errors that can occur while building, validating, encoding or decoding
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Hist(#[from] HistError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Format-level category, or `None` for I/O failures
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Error::Hist(err) => Some(err.category()),
            Error::Io(_) => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Hist(err) if err.is_structural())
    }

    /// The underlying format error, if any
    pub fn as_hist(&self) -> Option<&HistError> {
        match self {
            Error::Hist(err) => Some(err),
            Error::Io(_) => None,
        }
    }
}

/// Result type for histbuf operations
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn structure(msg: impl Into<String>) -> Error {
    HistError::structure(msg).into()
}

pub(crate) fn configuration(msg: impl Into<String>) -> Error {
    HistError::configuration(msg).into()
}

pub(crate) fn ownership(msg: impl Into<String>) -> Error {
    HistError::ownership(msg).into()
}

pub(crate) fn container(msg: impl Into<String>) -> Error {
    HistError::container(msg).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category() {
        assert_eq!(
            structure("bad shape").category(),
            Some(ErrorCategory::Structure)
        );
        assert!(structure("bad shape").is_structural());
        assert!(!container("bad magic").is_structural());

        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(io.category(), None);
        assert!(io.as_hist().is_none());
    }

    #[test]
    fn test_transparent_display() {
        assert_eq!(
            ownership("already attached").to_string(),
            "ownership error: already attached"
        );
        assert_eq!(
            configuration("no lzma").to_string(),
            "configuration error: no lzma"
        );
    }
}
