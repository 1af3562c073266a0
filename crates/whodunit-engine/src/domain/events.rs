//! Events the engine publishes for the transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use whodunit_core::event::EventMetadata;

use super::decisions::{Accusation, PendingAction, PublicClue, Vote};
use super::ledger::{MessageEntry, Viewer};
use super::roster::ParticipantId;
use super::stage::Stage;

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "participant", rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Participant(ParticipantId),
}

impl Audience {
    /// Whether a viewer should receive this event.
    #[must_use]
    pub fn admits(&self, viewer: &Viewer) -> bool {
        match (self, viewer) {
            (Self::Everyone, _) => true,
            (Self::Participant(_), Viewer::Everyone) => false,
            (Self::Participant(target), Viewer::Participant(id)) => target == id,
        }
    }
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEventKind {
    /// The game entered a new stage.
    StageChanged {
        from: Stage,
        to: Stage,
        label: String,
    },
    /// A turn order was generated for the current stage.
    TurnOrderSet {
        order: Vec<ParticipantId>,
        announcement: String,
    },
    /// The acting participant changed; `None` when the phase is complete.
    CurrentActorSet {
        participant: Option<ParticipantId>,
    },
    /// A human participant is now expected to act.
    PendingActionSet { action: PendingAction },
    /// The pending action was satisfied.
    PendingActionCleared { action: PendingAction },
    /// A ledger entry was appended.
    MessageAppended { entry: MessageEntry },
    /// The vote tally changed.
    VotesUpdated {
        votes: BTreeMap<ParticipantId, Vote>,
    },
    /// The accusation tally changed.
    AccusationsUpdated {
        accusations: BTreeMap<ParticipantId, Accusation>,
    },
    /// Private clues handed to one participant.
    CluesDelivered {
        participant: ParticipantId,
        round: u8,
        clues: Vec<String>,
    },
    /// The shared clue board changed.
    PublicCluesUpdated { clues: Vec<PublicClue> },
    /// A participant connected or disconnected.
    PresenceChanged {
        participant: ParticipantId,
        online: bool,
    },
    /// An autonomous participant started composing a reply.
    TypingStarted { participant: ParticipantId },
    /// An autonomous participant finished composing a reply.
    TypingStopped { participant: ParticipantId },
}

/// Event envelope for a game session.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Who may receive the event.
    pub audience: Audience,
    /// Event-specific payload.
    #[serde(flatten)]
    pub kind: EngineEventKind,
}

impl EngineEventKind {
    /// Stable routing name, e.g. `engine.stage_changed`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StageChanged { .. } => "engine.stage_changed",
            Self::TurnOrderSet { .. } => "engine.turn_order_set",
            Self::CurrentActorSet { .. } => "engine.current_actor_set",
            Self::PendingActionSet { .. } => "engine.pending_action_set",
            Self::PendingActionCleared { .. } => "engine.pending_action_cleared",
            Self::MessageAppended { .. } => "engine.message_appended",
            Self::VotesUpdated { .. } => "engine.votes_updated",
            Self::AccusationsUpdated { .. } => "engine.accusations_updated",
            Self::CluesDelivered { .. } => "engine.clues_delivered",
            Self::PublicCluesUpdated { .. } => "engine.public_clues_updated",
            Self::PresenceChanged { .. } => "engine.presence_changed",
            Self::TypingStarted { .. } => "engine.typing_started",
            Self::TypingStopped { .. } => "engine.typing_stopped",
        }
    }
}
