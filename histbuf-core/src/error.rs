//! Error types for histbuf operations
//!
//! Every failure in the object model falls into one of five kinds. None of
//! them is retried or recovered internally; they are surfaced to the caller
//! immediately.

use alloc::string::String;

/// Errors that can occur while building, validating or decoding a tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistError {
    /// A value outside a closed registry, or a feature not available in this build
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A field write violated its declared constraint
    #[error("{owner}.{field}: {reason}")]
    AttributeConstraint {
        owner: &'static str,
        field: &'static str,
        reason: String,
    },
    /// A node that already has a parent was attached again
    #[error("ownership error: {0}")]
    Ownership(String),
    /// The tree is internally inconsistent
    #[error("structural validation error: {0}")]
    Structure(String),
    /// The container framing is missing or damaged
    #[error("container format error: {0}")]
    ContainerFormat(String),
}

/// Coarse classification of a [`HistError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    AttributeConstraint,
    Ownership,
    Structure,
    ContainerFormat,
}

impl HistError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HistError::Configuration(msg.into())
    }

    pub fn constraint(owner: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        HistError::AttributeConstraint {
            owner,
            field,
            reason: reason.into(),
        }
    }

    pub fn ownership(msg: impl Into<String>) -> Self {
        HistError::Ownership(msg.into())
    }

    pub fn structure(msg: impl Into<String>) -> Self {
        HistError::Structure(msg.into())
    }

    pub fn container(msg: impl Into<String>) -> Self {
        HistError::ContainerFormat(msg.into())
    }

    /// Which of the five kinds this error belongs to
    pub const fn category(&self) -> ErrorCategory {
        match self {
            HistError::Configuration(_) => ErrorCategory::Configuration,
            HistError::AttributeConstraint { .. } => ErrorCategory::AttributeConstraint,
            HistError::Ownership(_) => ErrorCategory::Ownership,
            HistError::Structure(_) => ErrorCategory::Structure,
            HistError::ContainerFormat(_) => ErrorCategory::ContainerFormat,
        }
    }

    /// True for errors a non-throwing validity check may swallow
    pub const fn is_structural(&self) -> bool {
        matches!(self, HistError::Structure(_))
    }
}

impl core::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::AttributeConstraint => "attribute constraint",
            ErrorCategory::Ownership => "ownership",
            ErrorCategory::Structure => "structural validation",
            ErrorCategory::ContainerFormat => "container format",
        };
        write!(f, "{msg}")
    }
}

/// Result type for histbuf-core operations
pub type Result<T> = core::result::Result<T, HistError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_category() {
        assert_eq!(
            HistError::structure("x").category(),
            ErrorCategory::Structure
        );
        assert_eq!(
            HistError::constraint("RegularBinning", "num", "must be at least 1").category(),
            ErrorCategory::AttributeConstraint
        );
        assert!(HistError::structure("x").is_structural());
        assert!(!HistError::container("x").is_structural());
    }

    #[test]
    fn test_display() {
        let err = HistError::constraint("RegularBinning", "num", "must be at least 1");
        assert_eq!(err.to_string(), "RegularBinning.num: must be at least 1");
        assert_eq!(
            HistError::container("bad magic").to_string(),
            "container format error: bad magic"
        );
    }
}
