//! Errors for malformed data-model values (distributed keys, grants).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid distributed key: {0}")]
    InvalidDistributedKey(String),

    #[error("invalid grant: {0}")]
    InvalidGrant(String),
}
