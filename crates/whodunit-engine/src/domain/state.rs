//! The authoritative game state record.
//!
//! `GameState` is the single mutable record of a session. It collects the
//! events and memory lines each mutation produces, the way an aggregate
//! collects uncommitted events; the session drains both after every step.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use whodunit_core::event::EventMetadata;

use super::decisions::{Accusation, PendingAction, PublicClue, Vote};
use super::events::{Audience, EngineEvent, EngineEventKind};
use super::ledger::{MessageEntry, MessageKind, MessageLedger, NewEntry};
use super::roster::{ParticipantId, Roster};
use super::setup::{ClueTable, GameSetup};
use super::stage::Stage;
use super::turns::TurnOrder;

/// A statement captured during the current turn-based phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub participant: ParticipantId,
    pub text: String,
}

/// Progress of the closing reveal once every accusation is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealProgress {
    #[default]
    NotStarted,
    /// The accusation summary has been narrated.
    Summarized,
    TruthRevealed,
    ScoringRevealed,
}

/// Single authoritative record of a game.
#[derive(Debug)]
pub struct GameState {
    session_id: Uuid,
    pub(crate) title: String,
    pub(crate) synopsis: String,
    pub(crate) stage: Stage,
    pub(crate) roster: Roster,
    pub(crate) clues: ClueTable,
    pub(crate) dossiers: HashMap<ParticipantId, String>,
    pub(crate) culprit: Option<ParticipantId>,
    pub(crate) turns: TurnOrder,
    pub(crate) pending: Option<PendingAction>,
    /// Autonomous participant whose decision is in flight.
    pub(crate) in_flight: Option<ParticipantId>,
    /// A human statement recorded but not yet consumed by the next advance.
    pub(crate) recorded_statement: Option<Statement>,
    pub(crate) statements: Vec<Statement>,
    pub(crate) votes: BTreeMap<ParticipantId, Vote>,
    pub(crate) accusations: BTreeMap<ParticipantId, Accusation>,
    pub(crate) public_clues: Vec<PublicClue>,
    pub(crate) ledger: MessageLedger,
    pub(crate) clues_distributed: bool,
    pub(crate) reveal: RevealProgress,
    event_sequence: u64,
    uncommitted_events: Vec<EngineEvent>,
    uncommitted_memory: Vec<String>,
}

impl GameState {
    /// Creates a new game in `Waiting`.
    #[must_use]
    pub fn new(session_id: Uuid, setup: GameSetup) -> Self {
        Self {
            session_id,
            title: setup.title,
            synopsis: setup.synopsis,
            stage: Stage::Waiting,
            roster: setup.roster,
            clues: setup.clues,
            dossiers: setup.dossiers,
            culprit: setup.culprit,
            turns: TurnOrder::default(),
            pending: None,
            in_flight: None,
            recorded_statement: None,
            statements: Vec::new(),
            votes: BTreeMap::new(),
            accusations: BTreeMap::new(),
            public_clues: Vec::new(),
            ledger: MessageLedger::new(),
            clues_distributed: false,
            reveal: RevealProgress::default(),
            event_sequence: 0,
            uncommitted_events: Vec::new(),
            uncommitted_memory: Vec::new(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }

    #[must_use]
    pub fn turns(&self) -> &TurnOrder {
        &self.turns
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn votes(&self) -> &BTreeMap<ParticipantId, Vote> {
        &self.votes
    }

    #[must_use]
    pub fn accusations(&self) -> &BTreeMap<ParticipantId, Accusation> {
        &self.accusations
    }

    #[must_use]
    pub fn public_clues(&self) -> &[PublicClue] {
        &self.public_clues
    }

    /// Dossier text for a participant, empty when none was authored.
    #[must_use]
    pub fn dossier(&self, id: &ParticipantId) -> &str {
        self.dossiers.get(id).map_or("", String::as_str)
    }

    /// Queues an event for publication.
    pub(crate) fn emit(&mut self, kind: EngineEventKind, audience: Audience, now: DateTime<Utc>) {
        self.event_sequence += 1;
        self.uncommitted_events.push(EngineEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.type_name().to_owned(),
                session_id: self.session_id,
                sequence_number: self.event_sequence,
                occurred_at: now,
            },
            audience,
            kind,
        });
    }

    /// Appends to the ledger and queues the matching event. Chat lines are
    /// also queued for conversational memory.
    pub(crate) fn append(&mut self, entry: NewEntry, now: DateTime<Utc>) -> MessageEntry {
        let appended = self.ledger.append(entry, now).clone();
        if appended.kind == MessageKind::Chat {
            self.uncommitted_memory
                .push(format!("{}: {}", appended.author_name, appended.body));
        }
        let audience = appended
            .addressee
            .clone()
            .map_or(Audience::Everyone, Audience::Participant);
        self.emit(
            EngineEventKind::MessageAppended {
                entry: appended.clone(),
            },
            audience,
            now,
        );
        appended
    }

    /// Appends a public entry authored by the narrator.
    pub(crate) fn narrate(&mut self, body: impl Into<String>, kind: MessageKind, now: DateTime<Utc>) {
        let narrator = self.roster.narrator();
        let entry = NewEntry::public(narrator.id.clone(), narrator.name.clone(), body, kind);
        self.append(entry, now);
    }

    /// Queues a briefing line for conversational memory without a ledger entry.
    pub(crate) fn brief(&mut self, line: impl Into<String>) {
        self.uncommitted_memory.push(line.into());
    }

    /// Sets the pending action and announces it to everyone.
    pub(crate) fn open_pending(&mut self, action: PendingAction, now: DateTime<Utc>) {
        self.pending = Some(action.clone());
        self.emit(
            EngineEventKind::PendingActionSet { action },
            Audience::Everyone,
            now,
        );
    }

    /// Clears the pending action, if any, and announces it.
    pub(crate) fn clear_pending(&mut self, now: DateTime<Utc>) {
        if let Some(action) = self.pending.take() {
            self.emit(
                EngineEventKind::PendingActionCleared { action },
                Audience::Everyone,
                now,
            );
        }
    }

    /// Announces the current actor of the turn order.
    pub(crate) fn announce_current_actor(&mut self, now: DateTime<Utc>) {
        let participant = self.turns.current().cloned();
        self.emit(
            EngineEventKind::CurrentActorSet { participant },
            Audience::Everyone,
            now,
        );
    }

    /// Moves to `to`, resetting per-phase data and appending the transition
    /// line. Returns `false` without mutating if `to` would not move forward.
    pub(crate) fn enter_stage(&mut self, to: Stage, now: DateTime<Utc>) -> bool {
        let from = self.stage;
        if to.ordinal() <= from.ordinal() {
            return false;
        }
        self.stage = to;
        self.turns.clear();
        self.clear_pending(now);
        self.in_flight = None;
        self.recorded_statement = None;
        self.statements.clear();
        self.clues_distributed = false;
        self.emit(
            EngineEventKind::StageChanged {
                from,
                to,
                label: to.label(),
            },
            Audience::Everyone,
            now,
        );
        let system = self.roster.narrator();
        let entry = NewEntry::public(
            system.id.clone(),
            system.name.clone(),
            format!("Now entering: {}", to.label()),
            MessageKind::System,
        );
        self.append(entry, now);
        true
    }

    /// Takes the events queued since the last drain.
    pub(crate) fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }

    /// Takes the memory lines queued since the last drain.
    pub(crate) fn take_memory(&mut self) -> Vec<String> {
        std::mem::take(&mut self.uncommitted_memory)
    }

    /// Whether every suspect has cast a vote.
    #[must_use]
    pub fn votes_complete(&self) -> bool {
        self.votes.len() == self.roster.suspect_count()
    }

    /// Whether every suspect has made an accusation.
    #[must_use]
    pub fn accusations_complete(&self) -> bool {
        self.accusations.len() == self.roster.suspect_count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::roster::{Participant, ParticipantKind};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn state() -> GameState {
        let roster = Roster::new(
            vec![
                Participant::narrator("dm", "Narrator"),
                Participant::suspect("p1", "Hong", ParticipantKind::Human),
                Participant::suspect("p2", "Zhang", ParticipantKind::Autonomous),
                Participant::suspect("p3", "Xiu", ParticipantKind::Autonomous),
            ],
            ParticipantId::new("p1"),
        )
        .unwrap();
        GameState::new(Uuid::new_v4(), GameSetup::new("Test Manor", roster))
    }

    #[test]
    fn test_enter_stage_moves_forward_and_announces() {
        // Arrange
        let mut state = state();

        // Act
        let moved = state.enter_stage(Stage::Alibi, now());

        // Assert
        assert!(moved);
        assert_eq!(state.stage(), Stage::Alibi);
        let events = state.take_events();
        assert_eq!(events[0].kind.type_name(), "engine.stage_changed");
        assert_eq!(events[1].kind.type_name(), "engine.message_appended");
        assert_eq!(state.ledger().len(), 1);
        assert_eq!(state.ledger().entries()[0].kind, MessageKind::System);
    }

    #[test]
    fn test_enter_stage_refuses_to_regress() {
        let mut state = state();
        state.enter_stage(Stage::Investigation(1), now());
        state.take_events();

        let moved = state.enter_stage(Stage::Alibi, now());

        assert!(!moved);
        assert_eq!(state.stage(), Stage::Investigation(1));
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_event_sequence_numbers_increase() {
        let mut state = state();
        state.enter_stage(Stage::Alibi, now());
        state.narrate("Hello", MessageKind::Chat, now());

        let sequences: Vec<u64> = state
            .take_events()
            .iter()
            .map(|e| e.metadata.sequence_number)
            .collect();

        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_private_entry_event_is_addressed() {
        let mut state = state();

        state.append(
            NewEntry::private(
                ParticipantId::new("dm"),
                "Narrator",
                "secret",
                ParticipantId::new("p1"),
            ),
            now(),
        );

        let events = state.take_events();
        assert_eq!(
            events[0].audience,
            Audience::Participant(ParticipantId::new("p1"))
        );
    }

    #[test]
    fn test_chat_lines_are_queued_for_memory() {
        let mut state = state();

        state.narrate("The lights went out.", MessageKind::Chat, now());
        state.narrate("Now entering", MessageKind::System, now());

        assert_eq!(state.take_memory(), vec!["Narrator: The lights went out."]);
        assert!(state.take_memory().is_empty());
    }
}
