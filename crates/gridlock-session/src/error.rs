//! Error types for the session layer.

/// Errors that can occur while admitting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The nickname fails the 2–10 character `[A-Z0-9_-]` rule.
    #[error("invalid nickname {0:?}")]
    InvalidNick(String),
}
