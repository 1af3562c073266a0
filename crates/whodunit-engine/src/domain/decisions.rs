//! Pending actions and the structured decisions participants make.

use serde::{Deserialize, Serialize};

use super::roster::ParticipantId;

/// The kind of contribution a pending action awaits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A free-text statement for the current turn.
    Statement,
    /// A trust/suspect vote.
    Vote,
    /// A final accusation.
    Accusation,
}

/// The single outstanding request for a human contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// What is being awaited.
    pub kind: ActionKind,
    /// Who is expected to act.
    pub participant: ParticipantId,
}

impl PendingAction {
    /// Creates a pending action.
    #[must_use]
    pub fn new(kind: ActionKind, participant: ParticipantId) -> Self {
        Self { kind, participant }
    }

    /// Whether a submission of `kind` from `participant` satisfies this action.
    #[must_use]
    pub fn matches(&self, kind: ActionKind, participant: &ParticipantId) -> bool {
        self.kind == kind && &self.participant == participant
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    /// A decision provider reply that passed validation.
    Provider,
    /// An inbound human submission.
    Human,
    /// A deterministic substitute for a failed or invalid reply.
    Fallback,
}

/// One voter's trust/suspect pick. `trust` and `suspect` always differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub trust: ParticipantId,
    pub suspect: ParticipantId,
    pub rationale: String,
    pub origin: DecisionOrigin,
}

/// One accuser's pick for the culprit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accusation {
    pub accused: ParticipantId,
    pub rationale: String,
    pub origin: DecisionOrigin,
}

/// A clue a participant chose to share with everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicClue {
    pub publisher: ParticipantId,
    pub content: String,
}
