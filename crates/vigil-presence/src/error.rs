//! Error type for the presence tracker. There is currently nothing in
//! this crate that can fail — `touch`/`snapshot`/`locate` are pure
//! in-memory operations — but every crate in the workspace carries its
//! own error type and `Result` alias for consistency at call sites that
//! compose them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PresenceError>;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
}
