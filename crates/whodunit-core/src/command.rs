//! Inbound command abstractions.

use uuid::Uuid;

/// Trait implemented by every inbound operation a transport can submit.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The participant issuing the command.
    fn participant_id(&self) -> &str;
}
