//! Collaborator traits the engine calls out to.
//!
//! Decision providers produce natural-language or structured replies for
//! autonomous participants; conversational memory records chat lines and
//! hands recent history back as provider context.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::roster::ParticipantId;
use crate::domain::stage::Stage;

/// Failure of a decision provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The call exceeded the configured decision timeout.
    #[error("decision timed out")]
    Timeout,

    /// No provider is registered, or the backend cannot be reached.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider ran but reported an error.
    #[error("provider failed: {0}")]
    Failed(String),
}

/// Why a statement is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementPurpose {
    /// An alibi during the alibi phase.
    Alibi,
    /// A contribution to a discussion round.
    Discussion,
    /// An immediate reaction to freshly received clues.
    ClueReaction,
    /// The narrator's speaking order, as a structured object.
    TurnOrder,
    /// The narrator's reveal of the truth.
    RevealTruth,
    /// The narrator's scoring of every accusation.
    RevealScoring,
}

/// A statement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementRequest {
    pub purpose: StatementPurpose,
}

impl StatementRequest {
    #[must_use]
    pub fn new(purpose: StatementPurpose) -> Self {
        Self { purpose }
    }
}

/// Everything a provider may draw on for one decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionContext {
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub stage: Option<Stage>,
    /// Private clues the participant holds.
    pub clues: Vec<String>,
    /// Verbatim private dossier text.
    pub dossier: String,
    /// Recent conversational memory, oldest first.
    pub memory: Vec<String>,
    /// Extra task-specific material, such as a summary to reveal.
    pub note: Option<String>,
}

/// A participant eligible to be named in a vote or accusation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: ParticipantId,
    pub name: String,
}

/// Produces decisions for autonomous participants.
///
/// Replies are raw text; vote, accusation and turn-order replies are
/// expected to embed a JSON object that the validator extracts.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Produces a free-text statement, or a structured one for turn orders.
    async fn produce_statement(
        &self,
        request: &StatementRequest,
        context: &DecisionContext,
    ) -> Result<String, ProviderError>;

    /// Produces a `{"trust", "suspect", "rationale"}` object.
    async fn produce_vote(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError>;

    /// Produces an `{"accused", "rationale"}` object.
    async fn produce_accusation(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError>;

    /// Answers a participant's private question to the narrator.
    async fn answer_private(
        &self,
        question: &str,
        context: &DecisionContext,
    ) -> Result<String, ProviderError>;
}

/// Long-term conversational memory shared by a session's providers.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Records one line.
    async fn remember(&self, line: String);

    /// Returns up to `limit` most recent lines, oldest first.
    async fn recall(&self, limit: usize) -> Vec<String>;
}

/// Bounded in-process transcript; the default memory.
#[derive(Debug)]
pub struct TranscriptMemory {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl TranscriptMemory {
    /// Creates a transcript that keeps at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }
}

impl Default for TranscriptMemory {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl ConversationMemory for TranscriptMemory {
    async fn remember(&self, line: String) {
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    async fn recall(&self, limit: usize) -> Vec<String> {
        let lines = self
            .lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = lines.len().saturating_sub(limit);
        lines.iter().skip(skip).cloned().collect()
    }
}
