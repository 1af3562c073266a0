//! Single-driver advancement with coalesced reruns.
//!
//! Any number of triggers may request an advance concurrently. Exactly one
//! caller becomes the driver and steps the controller until it settles;
//! requests arriving meanwhile only set a rerun flag, which the driver honours
//! before releasing.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::stage::Stage;

/// Result of a single controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Advancement {
    /// Nothing to do: terminal or waiting for the designated human.
    Idle,
    /// Waiting on a human submission.
    Suspended,
    /// Work was done within the current stage.
    Progressed,
    /// The stage changed.
    Transitioned { from: Stage, to: Stage },
}

impl Advancement {
    /// Whether the driver should step again immediately.
    #[must_use]
    pub fn wants_continuation(self) -> bool {
        matches!(self, Self::Progressed | Self::Transitioned { .. })
    }
}

/// What a call to [`AdvancementSerializer::drive`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum DriveReport {
    /// Another driver was active; it will rerun on this caller's behalf.
    Coalesced,
    /// This caller drove; one entry per step.
    Drove { advancements: Vec<Advancement> },
}

impl DriveReport {
    /// Stage transitions performed during the drive, in order.
    #[must_use]
    pub fn transitions(&self) -> Vec<(Stage, Stage)> {
        match self {
            Self::Coalesced => Vec::new(),
            Self::Drove { advancements } => advancements
                .iter()
                .filter_map(|a| match a {
                    Advancement::Transitioned { from, to } => Some((*from, *to)),
                    _ => None,
                })
                .collect(),
        }
    }

    /// The last step's result, if this caller drove.
    #[must_use]
    pub fn last(&self) -> Option<Advancement> {
        match self {
            Self::Coalesced => None,
            Self::Drove { advancements } => advancements.last().copied(),
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    running: bool,
    rerun: bool,
}

/// Admits one driver at a time.
#[derive(Debug)]
pub struct AdvancementSerializer {
    flags: Mutex<Flags>,
    max_steps: usize,
}

/// Releases the running flag even if the driving future is dropped.
struct RunningGuard<'a> {
    serializer: &'a AdvancementSerializer,
    armed: bool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.serializer.flags().running = false;
        }
    }
}

impl AdvancementSerializer {
    /// Creates a serializer bounding each drive to `max_steps` steps.
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self {
            flags: Mutex::new(Flags::default()),
            max_steps: max_steps.max(1),
        }
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a driver is currently active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.flags().running
    }

    /// Drives `step` until it settles, or coalesces into the active driver.
    pub async fn drive<F, Fut>(&self, mut step: F) -> DriveReport
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Advancement>,
    {
        {
            let mut flags = self.flags();
            if flags.running {
                flags.rerun = true;
                debug!("advance requested while driving, coalesced");
                return DriveReport::Coalesced;
            }
            flags.running = true;
            flags.rerun = false;
        }
        let mut guard = RunningGuard {
            serializer: self,
            armed: true,
        };

        let mut advancements = Vec::new();
        loop {
            if advancements.len() >= self.max_steps {
                warn!(
                    max_steps = self.max_steps,
                    "drive hit its step bound, releasing"
                );
                break;
            }
            let advancement = step().await;
            advancements.push(advancement);
            if advancement.wants_continuation() {
                continue;
            }
            let mut flags = self.flags();
            if flags.rerun {
                flags.rerun = false;
                continue;
            }
            flags.running = false;
            guard.armed = false;
            break;
        }

        drop(guard);
        DriveReport::Drove { advancements }
    }
}
