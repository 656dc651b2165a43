//! # Error Handling
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Argument Errors (100-199)                                         │
//! │  │   └── InvalidArgument     - Caller passed a malformed argument      │
//! │  │                                                                      │
//! │  ├── Entropy Errors (200-299)                                          │
//! │  │   └── InsufficientEntropy - Pool estimate below the required floor  │
//! │  │                                                                      │
//! │  ├── Crypto Errors (300-399)                                           │
//! │  │   ├── Crypto              - Primitive-level failure (key exchange,  │
//! │  │   │                         AEAD setup, signature math)             │
//! │  │   └── AuthenticationFailed - AEAD tag mismatch on a block           │
//! │  │                                                                      │
//! │  ├── Container Errors (400-499)                                        │
//! │  │   ├── CorruptBlock        - Structurally invalid S4 block           │
//! │  │   └── OutOfBounds         - Cursor operation past block length      │
//! │  │                                                                      │
//! │  ├── Control Errors (500-599)                                         │
//! │  │   └── Cancelled           - Caller aborted a long-running KDF       │
//! │  │                                                                      │
//! │  └── I/O Errors (600-699)                                              │
//! │      └── Io                  - Underlying filesystem/byte-stream error │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `AuthenticationFailed` intentionally carries no inner detail: a caller
//! must not be able to distinguish "wrong password" from "corrupt AEAD tag"
//! from the error alone.

use thiserror::Error;

/// Result type alias for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Argument Errors (100-199)
    // ========================================================================
    /// A caller-supplied argument was malformed (wrong length, out-of-range
    /// value, etc).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Entropy Errors (200-299)
    // ========================================================================
    /// The entropy pool's bit estimate is below the floor required before a
    /// secret may be generated from it.
    #[error("insufficient entropy: have {have} bits, need {need}")]
    InsufficientEntropy {
        /// Current pool estimate, in bits.
        have: u32,
        /// Minimum bits required for the requested operation.
        need: u32,
    },

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================
    /// A cryptographic primitive failed (key exchange, signature, AEAD
    /// context setup).
    #[error("crypto operation failed: {0}")]
    Crypto(String),

    /// AEAD authentication failed while opening a block. Carries no detail:
    /// it must not be distinguishable from a wrong password by a caller.
    #[error("authentication failed")]
    AuthenticationFailed,

    // ========================================================================
    // Container Errors (400-499)
    // ========================================================================
    /// A block or container is structurally invalid (bad magic, truncated
    /// header, unknown type, length mismatch).
    #[error("corrupt block: {0}")]
    CorruptBlock(String),

    /// A cursor operation (seek, read, or random-access write) would cross
    /// the block's current length.
    #[error("cursor operation out of bounds: {0}")]
    OutOfBounds(String),

    // ========================================================================
    // Control Errors (500-599)
    // ========================================================================
    /// A caller-supplied progress callback returned false, aborting a
    /// long-running KDF before it finished.
    #[error("operation cancelled")]
    Cancelled,

    // ========================================================================
    // I/O Errors (600-699)
    // ========================================================================
    /// Underlying filesystem or byte-stream error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Numeric error code, organized by category:
    /// - 100-199: Argument
    /// - 200-299: Entropy
    /// - 300-399: Crypto
    /// - 400-499: Container
    /// - 500-599: Control
    /// - 600-699: I/O
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => 100,
            Error::InsufficientEntropy { .. } => 200,
            Error::Crypto(_) => 300,
            Error::AuthenticationFailed => 301,
            Error::CorruptBlock(_) => 400,
            Error::OutOfBounds(_) => 401,
            Error::Cancelled => 500,
            Error::Io(_) => 600,
        }
    }

    /// Whether retrying the same operation (possibly after the caller
    /// fixes the underlying condition) could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientEntropy { .. } | Error::Cancelled | Error::Io(_)
        )
    }

    /// Whether the error requires the user to supply something (a
    /// different password, rescue code, or confirmation) before retrying.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, Error::AuthenticationFailed | Error::CorruptBlock(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptBlock(err.to_string())
    }
}

// ============================================================================
// FFI ERROR REPRESENTATION
// ============================================================================

/// FFI-friendly error representation; safe to pass across a C boundary.
#[derive(Debug, Clone)]
#[repr(C)]
pub struct FfiError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Whether the error is recoverable.
    pub recoverable: bool,
}

impl From<Error> for FfiError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidArgument("x".into()).code(), 100);
        assert_eq!(Error::InsufficientEntropy { have: 1, need: 2 }.code(), 200);
        assert_eq!(Error::Crypto("x".into()).code(), 300);
        assert_eq!(Error::AuthenticationFailed.code(), 301);
        assert_eq!(Error::CorruptBlock("x".into()).code(), 400);
        assert_eq!(Error::OutOfBounds("x".into()).code(), 401);
        assert_eq!(Error::Cancelled.code(), 500);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::InsufficientEntropy { have: 1, need: 2 }.is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
        assert!(!Error::AuthenticationFailed.is_recoverable());
    }

    #[test]
    fn test_authentication_failed_carries_no_detail() {
        // The Display output must never hint at *why* authentication failed.
        assert_eq!(Error::AuthenticationFailed.to_string(), "authentication failed");
    }

    #[test]
    fn test_ffi_error_conversion() {
        let err = Error::CorruptBlock("bad magic".into());
        let ffi_err: FfiError = err.into();

        assert_eq!(ffi_err.code, 400);
        assert!(ffi_err.message.contains("bad magic"));
        assert!(!ffi_err.recoverable);
    }
}
