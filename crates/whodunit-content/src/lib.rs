//! Whodunit — scenario content.
//!
//! Loads a YAML scenario (roster, per-round clue tables, private dossiers),
//! validates it, and compiles it into the engine's [`GameSetup`].
//!
//! [`GameSetup`]: whodunit_engine::domain::setup::GameSetup

pub mod error;
pub mod scenario;

pub use error::ScenarioError;
pub use scenario::{Scenario, ScenarioDocument};
