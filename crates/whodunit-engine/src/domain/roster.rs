//! Participants and the immutable roster.

use std::fmt;

use serde::{Deserialize, Serialize};
use whodunit_core::error::DomainError;

/// Stable participant identifier.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How a participant's decisions are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// Decisions arrive later through an inbound submission.
    Human,
    /// Decisions are requested from a decision provider.
    Autonomous,
}

/// A participant's role in the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The game master: narrates, orders turns, never votes.
    Narrator,
    /// A character under suspicion; acts in every phase.
    Suspect,
}

/// One seat at the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier.
    pub id: ParticipantId,
    /// Display name; structured replies name participants by this.
    pub name: String,
    /// Human or autonomous.
    pub kind: ParticipantKind,
    /// Narrator or suspect.
    pub role: Role,
    /// Key into the per-round clue tables.
    pub clue_key: String,
    /// Private clues received so far, in delivery order.
    pub clues: Vec<String>,
    /// Whether a human participant is currently connected.
    pub online: bool,
}

impl Participant {
    /// Creates a suspect whose clue key defaults to its id.
    #[must_use]
    pub fn suspect(id: impl Into<String>, name: impl Into<String>, kind: ParticipantKind) -> Self {
        let id = ParticipantId::new(id);
        Self {
            clue_key: id.as_str().to_owned(),
            id,
            name: name.into(),
            kind,
            role: Role::Suspect,
            clues: Vec::new(),
            online: false,
        }
    }

    /// Creates the autonomous narrator.
    #[must_use]
    pub fn narrator(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = ParticipantId::new(id);
        Self {
            clue_key: id.as_str().to_owned(),
            id,
            name: name.into(),
            kind: ParticipantKind::Autonomous,
            role: Role::Narrator,
            clues: Vec::new(),
            online: false,
        }
    }

    /// Overrides the clue key.
    #[must_use]
    pub fn with_clue_key(mut self, key: impl Into<String>) -> Self {
        self.clue_key = key.into();
        self
    }

    /// Whether this participant is human.
    #[must_use]
    pub fn is_human(&self) -> bool {
        self.kind == ParticipantKind::Human
    }

    /// Autonomous participants are always reachable.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.kind == ParticipantKind::Autonomous || self.online
    }
}

/// Fixed membership of a game: one narrator plus the suspects.
#[derive(Debug, Clone)]
pub struct Roster {
    participants: Vec<Participant>,
    narrator: usize,
    designated_human: ParticipantId,
}

/// Minimum number of suspects for votes to have distinct trust/suspect picks.
pub const MIN_SUSPECTS: usize = 3;

impl Roster {
    /// Builds a roster, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if ids repeat, there is not exactly
    /// one narrator, there are fewer than three suspects, or the designated
    /// human is not a human suspect.
    pub fn new(
        participants: Vec<Participant>,
        designated_human: ParticipantId,
    ) -> Result<Self, DomainError> {
        let mut seen = std::collections::HashSet::new();
        for participant in &participants {
            if !seen.insert(participant.id.clone()) {
                return Err(DomainError::Validation(format!(
                    "duplicate participant id: {}",
                    participant.id
                )));
            }
        }

        let narrators: Vec<usize> = participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.role == Role::Narrator)
            .map(|(index, _)| index)
            .collect();
        let [narrator] = narrators.as_slice() else {
            return Err(DomainError::Validation(format!(
                "roster needs exactly one narrator, found {}",
                narrators.len()
            )));
        };
        let narrator = *narrator;
        if participants[narrator].is_human() {
            return Err(DomainError::Validation(
                "narrator must be autonomous".to_owned(),
            ));
        }

        let suspects = participants
            .iter()
            .filter(|p| p.role == Role::Suspect)
            .count();
        if suspects < MIN_SUSPECTS {
            return Err(DomainError::Validation(format!(
                "roster needs at least {MIN_SUSPECTS} suspects, found {suspects}"
            )));
        }

        let designated_ok = participants
            .iter()
            .any(|p| p.id == designated_human && p.is_human() && p.role == Role::Suspect);
        if !designated_ok {
            return Err(DomainError::Validation(format!(
                "designated human {designated_human} must be a human suspect"
            )));
        }

        Ok(Self {
            participants,
            narrator,
            designated_human,
        })
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Mutable lookup; membership itself never changes.
    pub(crate) fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    /// Looks up a participant by raw id string.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` when no participant matches.
    pub fn require(&self, id: &str) -> Result<&Participant, DomainError> {
        self.participants
            .iter()
            .find(|p| p.id.as_str() == id)
            .ok_or_else(|| DomainError::UnknownParticipant(id.to_owned()))
    }

    /// Every participant, narrator included, in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Action-eligible participants (the narrator excluded), in insertion order.
    pub fn suspects(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.role == Role::Suspect)
    }

    pub(crate) fn suspects_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants
            .iter_mut()
            .filter(|p| p.role == Role::Suspect)
    }

    /// Suspect ids in insertion order.
    #[must_use]
    pub fn suspect_ids(&self) -> Vec<ParticipantId> {
        self.suspects().map(|p| p.id.clone()).collect()
    }

    /// Number of suspects; the quorum for votes and accusations.
    #[must_use]
    pub fn suspect_count(&self) -> usize {
        self.suspects().count()
    }

    /// Suspects a given participant may name in a vote or accusation.
    #[must_use]
    pub fn candidates_for(&self, chooser: &ParticipantId) -> Vec<&Participant> {
        self.suspects().filter(|p| &p.id != chooser).collect()
    }

    /// The narrator.
    #[must_use]
    pub fn narrator(&self) -> &Participant {
        &self.participants[self.narrator]
    }

    /// The human whose connection starts the game.
    #[must_use]
    pub fn designated_human(&self) -> &ParticipantId {
        &self.designated_human
    }

    /// Display name for an id, falling back to the id itself.
    #[must_use]
    pub fn name_of(&self, id: &ParticipantId) -> String {
        self.get(id)
            .map_or_else(|| id.to_string(), |p| p.name.clone())
    }
}
