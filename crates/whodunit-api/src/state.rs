//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;
use whodunit_content::Scenario;
use whodunit_core::clock::Clock;
use whodunit_core::error::DomainError;
use whodunit_core::rng::SeededRng;
use whodunit_engine::application::gateway::DecisionGateway;
use whodunit_engine::application::ports::TranscriptMemory;
use whodunit_engine::application::session::{GameSession, SessionParts};
use whodunit_engine::config::EngineConfig;
use whodunit_engine::domain::roster::ParticipantKind;
use whodunit_engine::domain::stage::Stage;

use crate::providers::ProviderFactory;

/// How long sessions stay registered once nobody needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Kept after resolution so clients can read the reveals.
    pub finished: Duration,
    /// Unfinished sessions with no ledger activity for this long are dropped.
    pub idle: Duration,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            finished: Duration::from_secs(10 * 60),
            idle: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// A registered session and when it was seated.
struct Registered {
    session: Arc<GameSession>,
    seated_at: DateTime<Utc>,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions by id.
    sessions: Arc<RwLock<HashMap<Uuid, Registered>>>,
    /// Scenario new sessions are seated from.
    pub scenario: Arc<Scenario>,
    pub engine: EngineConfig,
    /// Wall clock for ledger timestamps and event metadata.
    pub clock: Arc<dyn Clock>,
    /// Builds the provider for every autonomous seat.
    pub providers: Arc<dyn ProviderFactory>,
    /// Seeds each session's fallback generator.
    pub rng_seed: Option<u64>,
    pub retention: Retention,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("scenario", &self.scenario.title())
            .field("engine", &self.engine)
            .field("rng_seed", &self.rng_seed)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        scenario: Scenario,
        engine: EngineConfig,
        clock: Arc<dyn Clock>,
        providers: Arc<dyn ProviderFactory>,
        rng_seed: Option<u64>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            scenario: Arc::new(scenario),
            engine,
            clock,
            providers,
            rng_seed,
            retention: Retention::default(),
        }
    }

    /// Replaces the default retention windows.
    #[must_use]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Drops sessions whose retention window has passed and returns how many
    /// went. A session that is mid-drive is never dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|id, Registered { session, seated_at }| {
            if session.is_driving() {
                return true;
            }
            let window = if session.stage() == Stage::Resolved {
                self.retention.finished
            } else {
                self.retention.idle
            };
            // A clock running behind the ledger counts as no time elapsed.
            let last = session.last_activity().unwrap_or(*seated_at);
            let quiet = now.signed_duration_since(last).to_std().unwrap_or_default();
            let keep = quiet < window;
            if !keep {
                info!(session_id = %id, stage = %session.stage().code(), "session evicted");
            }
            keep
        });
        before - sessions.len()
    }

    /// Seats a new game from the scenario and registers it.
    pub fn create_session(&self) -> Arc<GameSession> {
        self.evict_expired();
        let id = Uuid::new_v4();
        let setup = self.scenario.setup();

        let mut gateway = DecisionGateway::new(self.engine.decision_timeout);
        for participant in setup.roster.all() {
            if participant.kind == ParticipantKind::Autonomous {
                gateway = gateway.with_provider(
                    participant.id.clone(),
                    self.providers.provider_for(participant),
                );
            }
        }
        let rng = self
            .rng_seed
            .map_or_else(SeededRng::from_entropy, SeededRng::from_seed);

        let session = Arc::new(GameSession::new(
            id,
            setup,
            SessionParts {
                gateway,
                memory: Arc::new(TranscriptMemory::default()),
                clock: Arc::clone(&self.clock),
                rng: Box::new(rng),
                config: self.engine.clone(),
            },
        ));

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Registered {
                    session: Arc::clone(&session),
                    seated_at: self.clock.now(),
                },
            );
        info!(session_id = %id, "session registered");
        session
    }

    /// Looks up a live session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` if no session has this id.
    pub fn session(&self, id: Uuid) -> Result<Arc<GameSession>, DomainError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|registered| Arc::clone(&registered.session))
            .ok_or(DomainError::SessionNotFound(id))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
