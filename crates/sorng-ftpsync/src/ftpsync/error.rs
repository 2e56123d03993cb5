//! FTP-sync error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised error returned by every fallible core operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    /// Remote or local path the failing operation was working on.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpErrorKind {
    /// TCP / DNS resolution failure.
    ConnectionFailed,
    /// Wrong username/password.
    AuthFailed,
    /// An operation needed a live connection and there was none.
    NotConnected,
    /// Directory listing could not be fetched.
    ListingFailed,
    /// Transfer aborted or incomplete.
    TransferFailed,
    /// Server sent an un-parseable response.
    ProtocolError,
    /// An I/O error on the local side (file or directory).
    IoError,
    /// Operation timed out.
    Timeout,
    /// File/directory not found on the server.
    NotFound,
    /// Permission denied on the server.
    PermissionDenied,
    /// Operation cancelled by the caller.
    Cancelled,
    /// Config / parameter validation error.
    InvalidConfig,
    /// Operation not valid in the current state (e.g. cancel while idle).
    InvalidState,
    /// Catch-all.
    Unknown,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            path: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectionFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(FtpErrorKind::NotConnected, "Not connected to an FTP server")
    }

    pub fn listing_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ListingFailed, msg)
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::TransferFailed, msg)
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ProtocolError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::IoError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Cancelled, msg)
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidConfig, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::InvalidState, msg)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FtpErrorKind::Cancelled
    }

    /// Classify an FTP reply code into the most appropriate error kind.
    pub fn from_reply(code: u16, text: &str) -> Self {
        let kind = match code {
            421 => FtpErrorKind::ConnectionFailed,
            425 | 426 => FtpErrorKind::TransferFailed,
            430 | 530 => FtpErrorKind::AuthFailed,
            450 | 550 => {
                let lower = text.to_lowercase();
                if lower.contains("permission") || lower.contains("denied") {
                    FtpErrorKind::PermissionDenied
                } else if lower.contains("not found") || lower.contains("no such") {
                    FtpErrorKind::NotFound
                } else {
                    FtpErrorKind::ProtocolError
                }
            }
            451 | 452 | 552 => FtpErrorKind::TransferFailed,
            _ if code >= 400 => FtpErrorKind::ProtocolError,
            _ => FtpErrorKind::Unknown,
        };
        Self::new(kind, text).with_code(code)
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, &self.path) {
            (Some(code), _) => write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message),
            (None, Some(path)) => write!(f, "[FTP {:?}] {} ({})", self.kind, self.message, path),
            (None, None) => write!(f, "[FTP {:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io_error(e.to_string())
        }
    }
}

impl From<suppaftp::FtpError> for FtpError {
    fn from(e: suppaftp::FtpError) -> Self {
        match e {
            suppaftp::FtpError::ConnectionError(io) => Self::connection_failed(io.to_string()),
            other => {
                let text = other.to_string();
                match leading_reply_code(&text) {
                    Some(code) => Self::from_reply(code, &text),
                    None => Self::protocol_error(text),
                }
            }
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.message
    }
}

/// Find the first three-digit FTP reply code (`[1-5]xx`) in an error text.
fn leading_reply_code(text: &str) -> Option<u16> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|tok| tok.len() == 3)
        .filter_map(|tok| tok.parse::<u16>().ok())
        .find(|code| (100..600).contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_550_permission_is_classified() {
        let e = FtpError::from_reply(550, "550 Permission denied");
        assert_eq!(e.kind, FtpErrorKind::PermissionDenied);
        assert_eq!(e.code, Some(550));
    }

    #[test]
    fn reply_530_is_auth_failure() {
        assert_eq!(
            FtpError::from_reply(530, "Login incorrect").kind,
            FtpErrorKind::AuthFailed
        );
    }

    #[test]
    fn reply_code_is_found_inside_text() {
        assert_eq!(leading_reply_code("Invalid response: [550] No such file"), Some(550));
        assert_eq!(leading_reply_code("connection reset"), None);
        assert_eq!(leading_reply_code("port 21000 refused"), None);
    }

    #[test]
    fn display_includes_path_when_no_code() {
        let e = FtpError::listing_failed("boom").with_path("/a/");
        assert_eq!(e.to_string(), "[FTP ListingFailed] boom (/a/)");
    }
}
