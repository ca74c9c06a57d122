//! Error types for schema resolution, configuration, and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while resolving a schema identifier to a schema document.
///
/// Variants fall into two classes: the schema could not be found
/// (`UnknownSchema`, `NetworkDisabled`, `FileNotFound`, `ReadError`,
/// `NetworkError`) or it was found but is unusable (`InvalidJson`,
/// `FragmentNotFound`, `InvalidSchema`).
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("schema file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Schema errors (exit code 2)
    #[error("no known location for schema {uri}")]
    UnknownSchema { uri: String },

    #[error("schema {uri} is not cached locally and network fetch is disabled")]
    NetworkDisabled { uri: String },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("fragment {fragment} not found in schema {uri}")]
    FragmentNotFound { uri: String, fragment: String },

    #[error("invalid schema {uri}: {message}")]
    InvalidSchema { uri: String, message: String },

    #[error("schema has no $id property; pass an explicit URI")]
    MissingId,
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            Self::NetworkError { .. } => 3,
            _ => 2,
        }
    }

    /// True when the identifier could not be located at all, as opposed
    /// to resolving to something malformed.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileNotFound { .. }
            | Self::ReadError { .. }
            | Self::UnknownSchema { .. }
            | Self::NetworkDisabled { .. } => true,
            #[cfg(feature = "remote")]
            Self::NetworkError { .. } => true,
            _ => false,
        }
    }
}

/// Errors in the schema-location configuration (cache directory or
/// location file). These surface before any validation begins.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("schema location not found: {path}")]
    NotFound { path: PathBuf },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad location file {path}: {message}")]
    BadLocationFile { path: PathBuf, message: String },
}

impl LocationError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        3
    }
}

/// Fatal errors that abort a validation run before a report is produced.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("cannot read {path}: {source}")]
    ReadInstance {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    MalformedInstance {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("base schema ({tag}) not specified; unable to validate")]
    MissingBaseSchema { tag: String },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Resolve(e) => e.exit_code(),
            Self::Location(e) => e.exit_code(),
            Self::ReadInstance { .. } | Self::MalformedInstance { .. } => 3,
            Self::MissingBaseSchema { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_exit_codes() {
        let err = ResolveError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);
        assert!(err.is_not_found());

        let err = ResolveError::UnknownSchema {
            uri: "https://ex.org/unknown".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.is_not_found());

        let err = ResolveError::InvalidSchema {
            uri: "https://ex.org/bad".into(),
            message: "not an object".into(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(!err.is_not_found());
    }

    #[test]
    fn location_error_exit_code() {
        let err = LocationError::NotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::MissingBaseSchema {
            tag: "$schema".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = ValidateError::Resolve(ResolveError::NetworkDisabled {
            uri: "https://ex.org/s".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_base_schema_names_tag() {
        let err = ValidateError::MissingBaseSchema {
            tag: "_schema".into(),
        };
        assert!(err.to_string().contains("_schema"));
    }
}
