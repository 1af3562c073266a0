//! Engine tuning knobs.

use std::time::Duration;

/// Timing and bounds for a game session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single decision provider call.
    pub decision_timeout: Duration,
    /// Pause between clue distribution and the discussion that follows.
    pub investigation_pause: Duration,
    /// Pause between the truth reveal and the scoring reveal.
    pub reveal_pause: Duration,
    /// Most consecutive advances a single drive may perform.
    pub max_steps_per_drive: usize,
    /// Memory lines handed to a provider with each request.
    pub memory_recall_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decision_timeout: Duration::from_secs(30),
            investigation_pause: Duration::from_secs(2),
            reveal_pause: Duration::from_secs(5),
            max_steps_per_drive: 256,
            memory_recall_limit: 20,
        }
    }
}

impl EngineConfig {
    /// A configuration with no pauses, for tests and offline play.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            investigation_pause: Duration::ZERO,
            reveal_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}
