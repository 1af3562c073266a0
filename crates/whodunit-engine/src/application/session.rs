//! The public surface of one game.
//!
//! A `GameSession` owns the state store, the decision gateway, the
//! advancement serializer and the event broadcaster. The state lock is a
//! plain mutex that is never held across an await: every mutation happens in
//! a synchronous [`GameSession::commit`] closure, which also publishes the
//! events that mutation produced while the lock is still held. Memory lines
//! are recorded under a separate async guard so they reach memory in ledger
//! order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use whodunit_core::clock::Clock;
use whodunit_core::error::DomainError;
use whodunit_core::rng::DeterministicRng;

use crate::application::gateway::DecisionGateway;
use crate::application::ports::ConversationMemory;
use crate::application::serializer::{AdvancementSerializer, DriveReport};
use crate::config::EngineConfig;
use crate::domain::events::EngineEvent;
use crate::domain::roster::ParticipantKind;
use crate::domain::setup::GameSetup;
use crate::domain::state::GameState;

const EVENT_CAPACITY: usize = 256;

/// Collaborators a session is built from.
pub struct SessionParts {
    pub gateway: DecisionGateway,
    pub memory: Arc<dyn ConversationMemory>,
    pub clock: Arc<dyn Clock>,
    pub rng: Box<dyn DeterministicRng>,
    pub config: EngineConfig,
}

/// One game, from `Waiting` to `Resolved`.
pub struct GameSession {
    id: Uuid,
    state: Mutex<GameState>,
    events: broadcast::Sender<EngineEvent>,
    pub(crate) gateway: DecisionGateway,
    pub(crate) memory: Arc<dyn ConversationMemory>,
    pub(crate) clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn DeterministicRng>>,
    /// Serializes commit-then-remember so memory sees lines in ledger order.
    memory_order: tokio::sync::Mutex<()>,
    serializer: AdvancementSerializer,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("gateway", &self.gateway)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Creates a session in `Waiting`.
    #[must_use]
    pub fn new(id: Uuid, setup: GameSetup, parts: SessionParts) -> Self {
        for participant in setup.roster.all() {
            if participant.kind == ParticipantKind::Autonomous
                && !parts.gateway.has_provider(&participant.id)
            {
                warn!(
                    session_id = %id,
                    participant = %participant.id,
                    "autonomous participant has no decision provider, fallbacks will be used"
                );
            }
        }
        info!(session_id = %id, title = %setup.title, "game session created");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            state: Mutex::new(GameState::new(id, setup)),
            events,
            gateway: parts.gateway,
            memory: parts.memory,
            clock: parts.clock,
            rng: Mutex::new(parts.rng),
            memory_order: tokio::sync::Mutex::new(()),
            serializer: AdvancementSerializer::new(parts.config.max_steps_per_drive),
            config: parts.config,
        }
    }

    /// The session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribes to the live event feed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn lock_state(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `mutate` under the state lock and publishes the events it queued.
    ///
    /// Returns the closure's result and the memory lines it queued; callers
    /// hand those to [`GameSession::remember`] once the lock is released.
    pub(crate) fn commit<R>(
        &self,
        mutate: impl FnOnce(&mut GameState, DateTime<Utc>) -> R,
    ) -> (R, Vec<String>) {
        let mut state = self.lock_state();
        let result = mutate(&mut state, self.clock.now());
        for event in state.take_events() {
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
        let lines = state.take_memory();
        (result, lines)
    }

    /// Reads the state under the lock.
    pub(crate) fn read<R>(&self, view: impl FnOnce(&GameState) -> R) -> R {
        view(&self.lock_state())
    }

    /// Runs `f` with exclusive access to the fallback generator.
    pub(crate) fn with_rng<R>(&self, f: impl FnOnce(&mut dyn DeterministicRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(rng.as_mut())
    }

    /// Records memory lines produced by a commit.
    pub(crate) async fn remember(&self, lines: Vec<String>) {
        for line in lines {
            self.memory.remember(line).await;
        }
    }

    /// Commits a mutation and records its memory lines before any other
    /// commit can run.
    pub(crate) async fn apply<R>(
        &self,
        mutate: impl FnOnce(&mut GameState, DateTime<Utc>) -> R,
    ) -> R {
        let _order = self.memory_order.lock().await;
        let (result, lines) = self.commit(mutate);
        self.remember(lines).await;
        result
    }

    /// Requests an advance; coalesces into the active driver if there is one.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn request_advance(&self) -> DriveReport {
        let report = self.serializer.drive(|| self.advance()).await;
        if let DriveReport::Drove { advancements } = &report {
            info!(
                steps = advancements.len(),
                last = ?advancements.last(),
                "drive settled"
            );
        }
        report
    }

    /// Requests an advance on a background task.
    pub fn spawn_advance(self: &Arc<Self>) -> tokio::task::JoinHandle<DriveReport> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.request_advance().await })
    }

    /// Whether a drive is currently running.
    #[must_use]
    pub fn is_driving(&self) -> bool {
        self.serializer.is_running()
    }

    /// Verifies that `participant` is on the roster.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` when it is not.
    pub fn ensure_participant(&self, participant: &str) -> Result<(), DomainError> {
        self.read(|state| state.roster().require(participant).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use whodunit_core::clock::SystemClock;
    use whodunit_core::rng::SeededRng;

    use super::*;
    use crate::domain::ledger::{MessageKind, Viewer};
    use crate::domain::roster::{Participant, ParticipantId, Roster};

    /// Takes a while to remember anything that mentions the study.
    #[derive(Default)]
    struct SlowStudyMemory {
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationMemory for SlowStudyMemory {
        async fn remember(&self, line: String) {
            if line.contains("study") {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            self.lines.lock().unwrap().push(line);
        }

        async fn recall(&self, limit: usize) -> Vec<String> {
            let lines = self.lines.lock().unwrap();
            let skip = lines.len().saturating_sub(limit);
            lines[skip..].to_vec()
        }
    }

    fn session(memory: Arc<SlowStudyMemory>) -> GameSession {
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
        GameSession::new(
            Uuid::new_v4(),
            GameSetup::new("Test Manor", roster),
            SessionParts {
                gateway: DecisionGateway::new(Duration::from_secs(1)),
                memory,
                clock: Arc::new(SystemClock),
                rng: Box::new(SeededRng::from_seed(1)),
                config: EngineConfig::immediate(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_follows_ledger_order_under_concurrent_commits() {
        // Arrange
        let memory = Arc::new(SlowStudyMemory::default());
        let session = session(memory.clone());

        // Act
        tokio::join!(
            session.apply(|state, now| {
                state.narrate("The study door was locked.", MessageKind::Chat, now);
            }),
            session.apply(|state, now| {
                state.narrate("The lamp was still lit.", MessageKind::Chat, now);
            }),
        );

        // Assert
        let ledger: Vec<String> = session
            .history(&Viewer::Everyone)
            .into_iter()
            .map(|entry| format!("{}: {}", entry.author_name, entry.body))
            .collect();
        assert_eq!(
            ledger,
            vec![
                "Narrator: The study door was locked.".to_owned(),
                "Narrator: The lamp was still lit.".to_owned(),
            ]
        );
        assert_eq!(*memory.lines.lock().unwrap(), ledger);
    }
}
