//! Server configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use whodunit_engine::config::EngineConfig;

use crate::error::AppError;
use crate::state::Retention;

/// Everything the binary needs to start serving.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Scenario every new session is seated from.
    pub scenario_path: PathBuf,
    pub engine: EngineConfig,
    /// Seeds fallback draws and offline providers; OS entropy when absent.
    pub rng_seed: Option<u64>,
    /// How long finished and abandoned sessions stay registered.
    pub retention: Retention,
}

impl ServerConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `SCENARIO_PATH` is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `SCENARIO_PATH` is missing or any value
    /// fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse(&lookup, "PORT")?.unwrap_or(3000);
        let scenario_path = lookup("SCENARIO_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| AppError::Config("SCENARIO_PATH must be set".to_owned()))?;

        let mut engine = EngineConfig::default();
        if let Some(secs) = parse::<u64>(&lookup, "DECISION_TIMEOUT_SECS")? {
            engine.decision_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "INVESTIGATION_PAUSE_SECS")? {
            engine.investigation_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "REVEAL_PAUSE_SECS")? {
            engine.reveal_pause = Duration::from_secs(secs);
        }
        let rng_seed = parse(&lookup, "RNG_SEED")?;

        let mut retention = Retention::default();
        if let Some(secs) = parse::<u64>(&lookup, "FINISHED_RETENTION_SECS")? {
            retention.finished = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "IDLE_RETENTION_SECS")? {
            retention.idle = Duration::from_secs(secs);
        }

        Ok(Self {
            host,
            port,
            scenario_path,
            engine,
            rng_seed,
            retention,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} is invalid: {e}")))
        })
        .transpose()
}
