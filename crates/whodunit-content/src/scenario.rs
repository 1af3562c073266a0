//! YAML scenario documents and their compilation into a [`GameSetup`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use whodunit_engine::domain::roster::{Participant, ParticipantId, ParticipantKind, Roster};
use whodunit_engine::domain::setup::GameSetup;

use crate::error::ScenarioError;

/// The narrator block of a scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct NarratorDocument {
    pub id: String,
    pub name: String,
    /// Private context: the full story, including the culprit.
    #[serde(default)]
    pub dossier: String,
}

/// One suspect seat.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantDocument {
    pub id: String,
    pub name: String,
    pub kind: ParticipantKind,
    /// Key into the round clue tables; defaults to the id.
    #[serde(default)]
    pub clue_key: Option<String>,
    /// Marks the human whose connection starts the game.
    #[serde(default)]
    pub designated: bool,
    #[serde(default)]
    pub dossier: String,
}

/// A scenario as authored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    pub narrator: NarratorDocument,
    pub participants: Vec<ParticipantDocument>,
    /// Round number → clue key → clues.
    #[serde(default)]
    pub rounds: BTreeMap<u8, BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub culprit: Option<String>,
}

/// A validated scenario, ready to seat new games.
#[derive(Debug, Clone)]
pub struct Scenario {
    setup: GameSetup,
    digest: String,
}

impl Scenario {
    /// Reads and compiles a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Io` if the file cannot be read, otherwise as
    /// [`Scenario::parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Parses and compiles scenario source.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Parse` for malformed YAML and
    /// `ScenarioError::Invalid` when the game it describes is unplayable.
    pub fn parse(source: &str) -> Result<Self, ScenarioError> {
        let document: ScenarioDocument = serde_yaml::from_str(source)?;
        let setup = document.compile()?;
        let digest = digest(source);
        info!(
            title = %setup.title,
            suspects = setup.roster.suspect_count(),
            %digest,
            "scenario loaded"
        );
        Ok(Self { setup, digest })
    }

    /// A fresh setup for one game.
    #[must_use]
    pub fn setup(&self) -> GameSetup {
        self.setup.clone()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.setup.title
    }

    /// Hex SHA-256 of the scenario source.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl ScenarioDocument {
    /// Validates the document and builds the engine setup.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioError::Invalid` if the roster shape is wrong, the
    /// designated human is missing or repeated, a clue round is out of range,
    /// or the culprit is not a suspect.
    pub fn compile(self) -> Result<GameSetup, ScenarioError> {
        let designated: Vec<&ParticipantDocument> =
            self.participants.iter().filter(|p| p.designated).collect();
        let [designated] = designated.as_slice() else {
            return Err(ScenarioError::Invalid(format!(
                "exactly one participant must be designated, found {}",
                designated.len()
            )));
        };
        let designated_id = ParticipantId::new(designated.id.as_str());

        let mut participants = vec![Participant::narrator(
            self.narrator.id.as_str(),
            self.narrator.name.as_str(),
        )];
        let mut dossiers = vec![(
            ParticipantId::new(self.narrator.id.as_str()),
            self.narrator.dossier,
        )];
        for seat in self.participants {
            let mut participant = Participant::suspect(seat.id.as_str(), seat.name, seat.kind);
            if let Some(key) = seat.clue_key {
                participant = participant.with_clue_key(key);
            }
            dossiers.push((participant.id.clone(), seat.dossier));
            participants.push(participant);
        }
        let roster = Roster::new(participants, designated_id)?;

        let known_keys: HashSet<&str> = roster.suspects().map(|p| p.clue_key.as_str()).collect();
        let mut setup = GameSetup::new(self.title, roster.clone());
        setup.synopsis = self.synopsis;
        for (round, table) in self.rounds {
            for (key, clues) in table {
                if !known_keys.contains(key.as_str()) {
                    warn!(round, %key, "clue key matches no suspect, clues will never be delivered");
                }
                setup.clues.insert(round, key, clues)?;
            }
        }
        setup.dossiers = dossiers
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();

        if let Some(culprit) = self.culprit {
            let id = ParticipantId::new(culprit);
            if !roster.suspects().any(|p| p.id == id) {
                return Err(ScenarioError::Invalid(format!(
                    "culprit {id} is not a suspect"
                )));
            }
            setup.culprit = Some(id);
        }
        Ok(setup)
    }
}

fn digest(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

#[cfg(test)]
mod tests {
    use whodunit_engine::domain::roster::Role;

    use super::*;

    const MANOR: &str = r"
title: Murder at Willow Manor
synopsis: The host was found in the locked study.
narrator:
  id: dm
  name: Narrator
  dossier: Xiu poisoned the host's tea.
participants:
  - id: p1
    name: Hong
    kind: human
    designated: true
  - id: p2
    name: Zhang
    kind: autonomous
    dossier: You owe the host money.
  - id: p3
    name: Xiu
    kind: autonomous
    clue_key: xiu
rounds:
  1:
    p1: [A muddy boot print by the window.]
    xiu: [A cold cup of tea.]
  2:
    p2: [Xiu's gloves are damp.]
culprit: p3
";

    #[test]
    fn test_parse_builds_roster_clues_and_dossiers() {
        // Act
        let scenario = Scenario::parse(MANOR).unwrap();

        // Assert
        let setup = scenario.setup();
        assert_eq!(setup.title, "Murder at Willow Manor");
        assert_eq!(setup.roster.suspect_count(), 3);
        assert_eq!(setup.roster.narrator().role, Role::Narrator);
        assert_eq!(setup.roster.designated_human(), &ParticipantId::new("p1"));
        assert_eq!(
            setup.clues.clues_for(1, "xiu"),
            ["A cold cup of tea.".to_owned()]
        );
        assert_eq!(
            setup.dossier(&ParticipantId::new("p2")),
            "You owe the host money."
        );
        assert_eq!(setup.dossier(&ParticipantId::new("p1")), "");
        assert_eq!(setup.culprit, Some(ParticipantId::new("p3")));
    }

    #[test]
    fn test_digest_is_stable_hex_sha256() {
        // Act
        let first = Scenario::parse(MANOR).unwrap();
        let second = Scenario::parse(MANOR).unwrap();

        // Assert
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
        assert!(first.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_missing_designated_human_is_invalid() {
        // Arrange
        let source = MANOR.replace("    designated: true\n", "");

        // Act
        let result = Scenario::parse(&source);

        // Assert
        assert!(matches!(result, Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_third_clue_round_is_invalid() {
        // Arrange
        let source = MANOR.replace("culprit: p3", "  3:\n    p1: [Too late.]\nculprit: p3");

        // Act
        let result = Scenario::parse(&source);

        // Assert
        assert!(matches!(result, Err(ScenarioError::Invalid(message)) if message.contains("round 3")));
    }

    #[test]
    fn test_duplicate_ids_are_invalid() {
        // Arrange
        let source = MANOR.replace("id: p3", "id: p2");

        // Act
        let result = Scenario::parse(&source);

        // Assert
        assert!(matches!(result, Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_culprit_must_be_a_suspect() {
        // Arrange
        let source = MANOR.replace("culprit: p3", "culprit: dm");

        // Act
        let result = Scenario::parse(&source);

        // Assert
        assert!(matches!(result, Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        // Act
        let result = Scenario::parse("title: [unclosed");

        // Assert
        assert!(matches!(result, Err(ScenarioError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        // Act
        let result = Scenario::load("/nonexistent/whodunit/scenario.yaml");

        // Assert
        assert!(matches!(result, Err(ScenarioError::Io { .. })));
    }
}
