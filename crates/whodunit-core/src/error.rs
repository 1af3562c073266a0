//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Gameplay misbehavior (malformed provider replies, out-of-turn submissions)
/// never surfaces here; those are absorbed by the engine. This type covers
/// addressing mistakes and infrastructure failures only.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No game session exists with the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The participant id is not part of the session roster.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure error (content loading, I/O).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
