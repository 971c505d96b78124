//! `ErrorKind` — the wire-level error family (spec §7).
//!
//! Every component-local error (`SequenceError`, `BufferError`,
//! `SubscriptionError`, `RegistryError`) converts into one of these at the
//! broker boundary, the only place spec §7's propagation policy is enforced.
//! Grounded on the teacher's `ApiError` (`api/types.rs`): a small closed set
//! of wire-facing variants, each carrying a machine code plus a message.

use thiserror::Error;

use crate::core::constants::{
    CLOSE_BAD_REQUEST, CLOSE_FORBIDDEN, CLOSE_INTERNAL_SERVER_ERROR, CLOSE_UNAUTHORIZED,
    CLOSE_VERSION_MISMATCH,
};
use crate::model::packet::ErrorCode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("internal: {0}")]
    Internal(String),
    #[error("version mismatch: {0}")]
    VersionMismatch(String),
}

impl ErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            ErrorKind::Unauthorized(_) => ErrorCode::Unauthorized,
            ErrorKind::Forbidden(_) => ErrorCode::Forbidden,
            ErrorKind::Invalid(_) => ErrorCode::Invalid,
            ErrorKind::RateLimited(_) => ErrorCode::RateLimited,
            ErrorKind::Internal(_) => ErrorCode::Internal,
            ErrorKind::VersionMismatch(_) => ErrorCode::VersionMismatch,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorKind::Unauthorized(m)
            | ErrorKind::Forbidden(m)
            | ErrorKind::Invalid(m)
            | ErrorKind::RateLimited(m)
            | ErrorKind::Internal(m)
            | ErrorKind::VersionMismatch(m) => m,
        }
    }

    /// Close code used when there is no request correlation to ACK against
    /// (spec §6 close codes). `RateLimited` has no dedicated close code in
    /// the spec's table, so a capacity violation with no ACK correlation
    /// falls back to `Forbidden`.
    pub fn close_code(&self) -> u16 {
        match self {
            ErrorKind::Unauthorized(_) => CLOSE_UNAUTHORIZED,
            ErrorKind::Forbidden(_) | ErrorKind::RateLimited(_) => CLOSE_FORBIDDEN,
            ErrorKind::Invalid(_) => CLOSE_BAD_REQUEST,
            ErrorKind::Internal(_) => CLOSE_INTERNAL_SERVER_ERROR,
            ErrorKind::VersionMismatch(_) => CLOSE_VERSION_MISMATCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_match_spec_table() {
        assert_eq!(ErrorKind::Unauthorized("x".into()).close_code(), 4401);
        assert_eq!(ErrorKind::Forbidden("x".into()).close_code(), 4403);
        assert_eq!(ErrorKind::Invalid("x".into()).close_code(), 4400);
        assert_eq!(ErrorKind::Internal("x".into()).close_code(), 4500);
        assert_eq!(ErrorKind::VersionMismatch("x".into()).close_code(), 4409);
    }
}
