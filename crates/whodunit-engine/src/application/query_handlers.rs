//! Query handlers for the read side of a session.
//!
//! Snapshots and history are what a reconnecting transport replays before
//! following the live event feed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::session::GameSession;
use crate::domain::decisions::{Accusation, PendingAction, PublicClue, Vote};
use crate::domain::ledger::{MessageEntry, Viewer};
use crate::domain::roster::{ParticipantId, ParticipantKind, Role};
use crate::domain::stage::Stage;
use crate::domain::state::GameState;

/// What the table is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PendingView {
    /// Nothing; the game is moving or idle.
    None,
    /// A human participant must act.
    AwaitingHuman(PendingAction),
    /// An autonomous participant is composing a reply.
    AwaitingAutonomous(ParticipantId),
}

/// Public view of one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub kind: ParticipantKind,
    pub role: Role,
    pub online: bool,
}

/// Read-only view of a game session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// The session identifier.
    pub session_id: Uuid,
    pub title: String,
    pub synopsis: String,
    pub stage: Stage,
    pub stage_code: String,
    pub stage_label: String,
    /// Acting participant in a turn-based stage.
    pub current_actor: Option<ParticipantId>,
    pub turn_order: Vec<ParticipantId>,
    pub pending: PendingView,
    pub participants: Vec<ParticipantView>,
    pub votes: BTreeMap<ParticipantId, Vote>,
    pub accusations: BTreeMap<ParticipantId, Accusation>,
    pub public_clues: Vec<PublicClue>,
    /// The viewer's own private clues; empty for `Viewer::Everyone`.
    pub your_clues: Vec<String>,
    /// Ledger entries visible to the viewer.
    pub message_count: usize,
}

/// Builds the viewer's snapshot of a session.
#[must_use]
pub fn get_session_view(session: &GameSession, viewer: &Viewer) -> SessionView {
    session.read(|state| {
        let roster = state.roster();
        let pending = match (state.pending(), &state.in_flight) {
            (Some(action), _) => PendingView::AwaitingHuman(action.clone()),
            (None, Some(id)) => PendingView::AwaitingAutonomous(id.clone()),
            (None, None) => PendingView::None,
        };
        let your_clues = match viewer {
            Viewer::Everyone => Vec::new(),
            Viewer::Participant(id) => roster
                .get(id)
                .map(|p| p.clues.clone())
                .unwrap_or_default(),
        };
        let stage = state.stage();
        SessionView {
            session_id: state.session_id(),
            title: state.title.clone(),
            synopsis: state.synopsis.clone(),
            stage,
            stage_code: stage.code(),
            stage_label: stage.label(),
            current_actor: state.turns().current().cloned(),
            turn_order: state.turns().ids().to_vec(),
            pending,
            participants: roster
                .all()
                .map(|p| ParticipantView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    kind: p.kind,
                    role: p.role,
                    online: p.is_reachable(),
                })
                .collect(),
            votes: state.votes().clone(),
            accusations: state.accusations().clone(),
            public_clues: state.public_clues().to_vec(),
            your_clues,
            message_count: state.ledger().history(viewer).count(),
        }
    })
}

/// Replays the ledger entries visible to `viewer`, in order.
#[must_use]
pub fn get_history(session: &GameSession, viewer: &Viewer) -> Vec<MessageEntry> {
    session.read(|state| state.ledger().history(viewer).cloned().collect())
}

impl GameSession {
    /// The viewer's snapshot of the game.
    #[must_use]
    pub fn snapshot(&self, viewer: &Viewer) -> SessionView {
        get_session_view(self, viewer)
    }

    /// The ledger entries visible to `viewer`.
    #[must_use]
    pub fn history(&self, viewer: &Viewer) -> Vec<MessageEntry> {
        get_history(self, viewer)
    }

    /// The current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.read(GameState::stage)
    }

    /// Timestamp of the newest ledger entry, if anything has been said.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.read(|state| state.ledger().entries().last().map(|entry| entry.timestamp))
    }
}
