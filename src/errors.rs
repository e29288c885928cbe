// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture core
//!
//! [`CameraError`] is the taxonomy every public operation reports through.
//! Lower layers keep their own error types ([`BackendError`], container and
//! config errors) and are folded into it at the controller boundary.

use crate::backends::camera::types::BackendError;
use thiserror::Error;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Capture-session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The session could not be (re)configured in its current state
    #[error("Session configuration failed: {0}")]
    ConfigurationFailed(String),
    /// Camera (or required microphone) access was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// A capture device could not be found, opened or attached
    #[error("Device setup failed: {0}")]
    DeviceSetupFailed(String),
    /// A still or recording capture produced no usable data
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    /// Writing a media file failed
    #[error("File output failed: {0}")]
    FileOutputFailed(String),
    /// Anything else, including a worker that went away
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CameraError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CameraError::ConfigurationFailed(_) => "configurationFailed",
            CameraError::PermissionDenied(_) => "permissionDenied",
            CameraError::DeviceSetupFailed(_) => "deviceSetupFailed",
            CameraError::CaptureFailed(_) => "captureFailed",
            CameraError::FileOutputFailed(_) => "fileOutputFailed",
            CameraError::Unknown(_) => "unknown",
        }
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied(msg) => CameraError::PermissionDenied(msg),
            BackendError::NotAvailable(_)
            | BackendError::DeviceNotFound(_)
            | BackendError::InitializationFailed(_)
            | BackendError::Disconnected(_)
            | BackendError::Busy(_) => CameraError::DeviceSetupFailed(err.to_string()),
            BackendError::CaptureFailed(msg) => CameraError::CaptureFailed(msg),
            BackendError::IoError(msg) => CameraError::FileOutputFailed(msg),
            BackendError::Other(msg) => CameraError::Unknown(msg),
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::FileOutputFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_onto_taxonomy() {
        let err: CameraError = BackendError::DeviceNotFound("front".into()).into();
        assert_eq!(err.kind(), "deviceSetupFailed");

        let err: CameraError = BackendError::PermissionDenied("camera".into()).into();
        assert!(matches!(err, CameraError::PermissionDenied(_)));

        let err: CameraError = BackendError::IoError("disk full".into()).into();
        assert!(matches!(err, CameraError::FileOutputFailed(_)));
    }

    #[test]
    fn io_errors_are_file_output_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = CameraError::from(io);
        assert_eq!(err.kind(), "fileOutputFailed");
        assert!(err.to_string().contains("read-only"));
    }
}
