//! Whodunit — stage and turn orchestration bounded context.
//!
//! Drives a murder-mystery game through its fixed phases, coordinating human
//! participants and autonomous decision providers, and guarantees that shared
//! game state advances exactly once per event.

pub mod application;
pub mod config;
pub mod domain;
