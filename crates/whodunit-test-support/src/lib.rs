//! Shared test doubles and fixtures for the Whodunit orchestration engine.

mod clock;
mod fixtures;
mod memory;
mod provider;
mod rng;

pub use clock::FixedClock;
pub use fixtures::{
    AUTONOMOUS, HUMAN, NARRATOR, Table, five_suspect_roster, manor_setup, table, table_with,
};
pub use memory::RecordingMemory;
pub use provider::{CallKind, ProviderCall, ScriptedProvider};
pub use rng::{MockRng, SequenceRng};
