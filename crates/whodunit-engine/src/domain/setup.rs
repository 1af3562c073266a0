//! Everything a game needs before the first advance.

use std::collections::{BTreeMap, HashMap};

use whodunit_core::error::DomainError;

use super::roster::{ParticipantId, Roster};
use super::stage::ROUNDS;

/// Per-round clue tables: round → clue key → clue texts in delivery order.
#[derive(Debug, Clone, Default)]
pub struct ClueTable {
    rounds: BTreeMap<u8, HashMap<String, Vec<String>>>,
}

impl ClueTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds clues for `key` in `round`, appending to any already present.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the round is outside `1..=ROUNDS`.
    pub fn insert(
        &mut self,
        round: u8,
        key: impl Into<String>,
        clues: impl IntoIterator<Item = String>,
    ) -> Result<(), DomainError> {
        if round == 0 || round > ROUNDS {
            return Err(DomainError::Validation(format!(
                "clue round {round} is outside 1..={ROUNDS}"
            )));
        }
        self.rounds
            .entry(round)
            .or_default()
            .entry(key.into())
            .or_default()
            .extend(clues);
        Ok(())
    }

    /// Clues for a key in a round; empty when none were authored.
    #[must_use]
    pub fn clues_for(&self, round: u8, key: &str) -> &[String] {
        self.rounds
            .get(&round)
            .and_then(|table| table.get(key))
            .map_or(&[], Vec::as_slice)
    }
}

/// Static content plus roster for one game.
#[derive(Debug, Clone)]
pub struct GameSetup {
    pub title: String,
    pub synopsis: String,
    pub roster: Roster,
    pub clues: ClueTable,
    /// Verbatim private context per participant, handed to their provider.
    pub dossiers: HashMap<ParticipantId, String>,
    /// The true culprit, when the content names one; used for templated scoring.
    pub culprit: Option<ParticipantId>,
}

impl GameSetup {
    /// Creates a setup with no clues, dossiers or culprit.
    #[must_use]
    pub fn new(title: impl Into<String>, roster: Roster) -> Self {
        Self {
            title: title.into(),
            synopsis: String::new(),
            roster,
            clues: ClueTable::new(),
            dossiers: HashMap::new(),
            culprit: None,
        }
    }

    /// Dossier text for a participant, empty when none was authored.
    #[must_use]
    pub fn dossier(&self, id: &ParticipantId) -> &str {
        self.dossiers.get(id).map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup_by_round_and_key() {
        // Arrange
        let mut table = ClueTable::new();

        // Act
        table
            .insert(1, "p1", vec!["bloody glove".to_owned()])
            .unwrap();
        table.insert(1, "p1", vec!["torn note".to_owned()]).unwrap();

        // Assert
        assert_eq!(table.clues_for(1, "p1"), ["bloody glove", "torn note"]);
        assert!(table.clues_for(2, "p1").is_empty());
        assert!(table.clues_for(1, "p9").is_empty());
    }

    #[test]
    fn test_insert_rejects_unknown_round() {
        let mut table = ClueTable::new();

        let result = table.insert(3, "p1", Vec::new());

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
