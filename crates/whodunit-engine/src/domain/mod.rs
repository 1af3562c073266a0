//! Domain model: stages, roster, turn order, ledger, decisions and the
//! structured response validator.

pub mod commands;
pub mod decisions;
pub mod events;
pub mod ledger;
pub mod roster;
pub mod setup;
pub mod stage;
pub mod state;
pub mod turns;
pub mod validator;
