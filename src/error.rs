//! Error types for ivrflow.
//!
//! All errors are represented by the `IvrFlowError` enum. None of them is
//! fatal: every operation that fails can be retried by invoking it again.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all ivrflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum IvrFlowError {
    /// Caller input rejected before any transcoding or backend call
    /// (empty flow name, duplicate name, deploy with unsaved changes).
    #[error("{0}")]
    Validation(String),

    /// Retrieved flow data is neither a record array, a recognized object
    /// shape, nor a parseable JSON string.
    #[error("{0}")]
    MalformedPayload(String),

    /// Non-2xx backend answer. For 400-class responses `message` is the
    /// backend's own error text.
    #[error("backend error ({}): {message}", display_status(.status))]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON).
    #[error("{0}")]
    Convert(String),

    /// Transport errors talking to the HTTP backend.
    #[error("{0}")]
    Http(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl IvrFlowError {
    /// Backend failure without a structured error payload.
    pub fn backend(
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        IvrFlowError::Backend {
            status,
            message: message.into(),
        }
    }
}

fn display_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
}

impl From<IvrFlowError> for String {
    fn from(val: IvrFlowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for IvrFlowError {
    fn from(error: std::io::Error) -> Self {
        IvrFlowError::IoError(error.to_string())
    }
}

impl From<IvrFlowError> for std::io::Error {
    fn from(val: IvrFlowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for IvrFlowError {
    fn from(error: serde_json::Error) -> Self {
        IvrFlowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for IvrFlowError {
    fn from(error: toml::de::Error) -> Self {
        IvrFlowError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for IvrFlowError {
    fn from(error: reqwest::Error) -> Self {
        IvrFlowError::Http(error.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::IvrFlowError;

    #[test]
    fn test_backend_display() {
        let err = IvrFlowError::backend(Some(400), "flowName already deployed");
        assert_eq!(err.to_string(), "backend error (400): flowName already deployed");

        let err = IvrFlowError::backend(None, "connection refused");
        assert_eq!(err.to_string(), "backend error (-): connection refused");
    }
}
