//! The fixed phase sequence of a game.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of investigation/discussion rounds in a game.
pub const ROUNDS: u8 = 2;

/// One phase of the fixed game sequence.
///
/// The sequence is `Waiting → Alibi → Investigation(1) → Discussion(1) →
/// Voting(1) → Investigation(2) → Discussion(2) → FinalAccusation →
/// Resolved`. Only round 1 has a voting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stage", content = "round", rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the designated human participant to connect.
    Waiting,
    /// Alibi statements, one speaker at a time.
    Alibi,
    /// Clue distribution for a round.
    Investigation(u8),
    /// Turn-based discussion for a round.
    Discussion(u8),
    /// Trust/suspect voting for a round.
    Voting(u8),
    /// Every suspect names the culprit.
    FinalAccusation,
    /// Terminal: truth and scoring are revealed.
    Resolved,
}

impl Stage {
    /// Returns the stage that follows this one, or `None` for `Resolved`.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Alibi),
            Self::Alibi => Some(Self::Investigation(1)),
            Self::Investigation(round) => Some(Self::Discussion(round)),
            Self::Discussion(1) => Some(Self::Voting(1)),
            Self::Discussion(_) => Some(Self::FinalAccusation),
            Self::Voting(round) if round < ROUNDS => Some(Self::Investigation(round + 1)),
            Self::Voting(_) => Some(Self::FinalAccusation),
            Self::FinalAccusation => Some(Self::Resolved),
            Self::Resolved => None,
        }
    }

    /// Position of this stage in the fixed sequence; strictly increasing.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Alibi => 1,
            Self::Investigation(1) => 2,
            Self::Discussion(1) => 3,
            Self::Voting(1) => 4,
            Self::Investigation(_) => 5,
            Self::Discussion(_) => 6,
            Self::Voting(_) => 7,
            Self::FinalAccusation => 8,
            Self::Resolved => 9,
        }
    }

    /// The round this stage belongs to, if it is a per-round stage.
    #[must_use]
    pub fn round(self) -> Option<u8> {
        match self {
            Self::Investigation(round) | Self::Discussion(round) | Self::Voting(round) => {
                Some(round)
            }
            _ => None,
        }
    }

    /// Whether this stage collects one statement per suspect in turn order.
    #[must_use]
    pub fn is_turn_based(self) -> bool {
        matches!(self, Self::Alibi | Self::Discussion(_))
    }

    /// Stable machine code, e.g. `discussion_2`.
    #[must_use]
    pub fn code(self) -> String {
        match self {
            Self::Waiting => "waiting".to_owned(),
            Self::Alibi => "alibi".to_owned(),
            Self::Investigation(round) => format!("investigation_{round}"),
            Self::Discussion(round) => format!("discussion_{round}"),
            Self::Voting(round) => format!("voting_{round}"),
            Self::FinalAccusation => "final_accusation".to_owned(),
            Self::Resolved => "resolved".to_owned(),
        }
    }

    /// Human-readable label shown to participants.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Waiting => "Waiting for players".to_owned(),
            Self::Alibi => "Alibi statements".to_owned(),
            Self::Investigation(round) => format!("Crime scene investigation, round {round}"),
            Self::Discussion(round) => format!("Deduction round {round}"),
            Self::Voting(round) => format!("Voting, round {round}"),
            Self::FinalAccusation => "Final accusation".to_owned(),
            Self::Resolved => "Case closed".to_owned(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_sequence() -> Vec<Stage> {
        let mut stages = vec![Stage::Waiting];
        let mut current = Stage::Waiting;
        while let Some(next) = current.next() {
            stages.push(next);
            current = next;
        }
        stages
    }

    #[test]
    fn test_sequence_matches_fixed_order() {
        assert_eq!(
            full_sequence(),
            vec![
                Stage::Waiting,
                Stage::Alibi,
                Stage::Investigation(1),
                Stage::Discussion(1),
                Stage::Voting(1),
                Stage::Investigation(2),
                Stage::Discussion(2),
                Stage::FinalAccusation,
                Stage::Resolved,
            ]
        );
    }

    #[test]
    fn test_ordinal_strictly_increases_along_sequence() {
        let stages = full_sequence();

        for pair in stages.windows(2) {
            assert!(pair[0].ordinal() < pair[1].ordinal(), "{pair:?}");
        }
    }

    #[test]
    fn test_later_round_voting_sits_between_discussion_and_accusation() {
        let voting = Stage::Voting(2);

        assert!(Stage::Discussion(2).ordinal() < voting.ordinal());
        assert!(voting.ordinal() < Stage::FinalAccusation.ordinal());
        assert_eq!(voting.next(), Some(Stage::FinalAccusation));
    }

    #[test]
    fn test_codes_are_snake_case() {
        assert_eq!(Stage::Discussion(2).code(), "discussion_2");
        assert_eq!(Stage::FinalAccusation.to_string(), "final_accusation");
    }

    #[test]
    fn test_serializes_with_round_content() {
        let json = serde_json::to_value(Stage::Voting(1)).unwrap();

        assert_eq!(json, serde_json::json!({ "stage": "voting", "round": 1 }));
    }

    #[test]
    fn test_only_alibi_and_discussion_are_turn_based() {
        let turn_based: Vec<Stage> = full_sequence()
            .into_iter()
            .filter(|s| s.is_turn_based())
            .collect();

        assert_eq!(
            turn_based,
            vec![Stage::Alibi, Stage::Discussion(1), Stage::Discussion(2)]
        );
    }
}
