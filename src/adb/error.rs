use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB-related operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("Could not resolve ADB server address {host}:{port} to an IPv4 address")]
    ServerAddress { host: String, port: u16 },

    #[error("Failed to reach ADB server at {address}: {source}")]
    ServerUnreachable {
        address: String,
        source: adb_client::RustADBError,
    },

    #[error("Device '{serial}' not found on the ADB server (available: {available:?})")]
    DeviceNotFound {
        serial: String,
        available: Vec<String>,
    },

    #[error("Failed to open device '{serial}': {source}")]
    ConnectionFailed {
        serial: String,
        source: adb_client::RustADBError,
    },

    #[error("Shell command '{command}' failed: {source}")]
    ShellCommandFailed {
        command: String,
        source: adb_client::RustADBError,
    },

    #[error("'adb' binary could not be started: {source}")]
    AdbBinaryUnavailable { source: std::io::Error },

    #[error("adb {command} exited with {status}: {stderr}")]
    AdbProcessFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: Duration,
        description: String,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Could not parse screen size from 'wm size' output: {output:?}")]
    ScreenSizeParseFailed { output: String },

    #[error("Failed to decode screenshot ({bytes} bytes): {source}")]
    ScreenshotDecodeFailed {
        bytes: usize,
        source: image::ImageError,
    },

    #[error("Tap coordinates are out of bounds: x={x}, y={y} (screen {width}x{height})")]
    TapOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Package command '{command}' was rejected: {output}")]
    PackageCommandRejected { command: String, output: String },
}

impl AdbError {
    /// True when the error means the device or server went away rather than a
    /// single command misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AdbError::ServerUnreachable { .. }
            | AdbError::DeviceNotFound { .. }
            | AdbError::ConnectionFailed { .. } => true,
            AdbError::ShellCommandFailed { source, .. } => {
                let err_str = source.to_string().to_lowercase();
                err_str.contains("closed")
                    || err_str.contains("broken pipe")
                    || err_str.contains("not found")
                    || err_str.contains("offline")
            }
            AdbError::AdbProcessFailed { stderr, .. } => {
                stderr.contains("not found") || stderr.contains("offline")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_not_a_disconnect() {
        let err = AdbError::Timeout {
            duration: Duration::from_secs(5),
            description: "tap".to_string(),
        };
        assert!(!err.is_disconnect());
    }

    #[test]
    fn offline_process_failure_is_a_disconnect() {
        let err = AdbError::AdbProcessFailed {
            command: "shell pidof x".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "error: device offline".to_string(),
        };
        assert!(err.is_disconnect());
    }

    #[test]
    fn display_names_the_serial() {
        let err = AdbError::DeviceNotFound {
            serial: "emulator-5554".to_string(),
            available: vec!["R58M123".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("emulator-5554"));
        assert!(msg.contains("R58M123"));
    }
}
