//! Scripted decision provider — replays canned replies and records calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use whodunit_engine::application::ports::{
    Candidate, DecisionContext, DecisionProvider, ProviderError, StatementPurpose,
    StatementRequest,
};
use whodunit_engine::domain::roster::ParticipantId;

type Reply = Result<String, ProviderError>;

/// Which provider method was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Statement(StatementPurpose),
    Vote,
    Accusation,
    PrivateAnswer,
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub kind: CallKind,
    pub participant: ParticipantId,
}

/// A provider that pops scripted replies per method, falling back to
/// well-formed defaults once a script runs dry.
///
/// Defaults: statements are a short line naming the speaker (turn-order
/// requests fail, so the engine falls back to roster order), votes trust the
/// first candidate and suspect the second, accusations name the first
/// candidate.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    statements: Mutex<VecDeque<Reply>>,
    votes: Mutex<VecDeque<Reply>>,
    accusations: Mutex<VecDeque<Reply>>,
    answers: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<ProviderCall>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// A provider that only uses defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues statement replies, consumed in order across all purposes.
    #[must_use]
    pub fn with_statements(self, replies: Vec<Reply>) -> Self {
        self.statements.lock().unwrap().extend(replies);
        self
    }

    /// Queues vote replies.
    #[must_use]
    pub fn with_votes(self, replies: Vec<Reply>) -> Self {
        self.votes.lock().unwrap().extend(replies);
        self
    }

    /// Queues accusation replies.
    #[must_use]
    pub fn with_accusations(self, replies: Vec<Reply>) -> Self {
        self.accusations.lock().unwrap().extend(replies);
        self
    }

    /// Queues private answers.
    #[must_use]
    pub fn with_answers(self, replies: Vec<Reply>) -> Self {
        self.answers.lock().unwrap().extend(replies);
        self
    }

    /// Sleeps before every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call made so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls of `kind`.
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }

    async fn respond(
        &self,
        kind: CallKind,
        context: &DecisionContext,
        queue: &Mutex<VecDeque<Reply>>,
        default: impl FnOnce() -> Reply,
    ) -> Reply {
        self.calls.lock().unwrap().push(ProviderCall {
            kind,
            participant: context.participant_id.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = queue.lock().unwrap().pop_front();
        scripted.unwrap_or_else(default)
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn produce_statement(
        &self,
        request: &StatementRequest,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        let purpose = request.purpose;
        self.respond(
            CallKind::Statement(purpose),
            context,
            &self.statements,
            || match purpose {
                StatementPurpose::TurnOrder => {
                    Err(ProviderError::Failed("unscripted turn order".to_owned()))
                }
                _ => Ok(format!(
                    "{} has nothing to hide ({purpose:?}).",
                    context.participant_name
                )),
            },
        )
        .await
    }

    async fn produce_vote(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError> {
        self.respond(CallKind::Vote, context, &self.votes, || {
            Ok(serde_json::json!({
                "trust": candidates[0].name,
                "suspect": candidates[1].name,
                "rationale": "A hunch."
            })
            .to_string())
        })
        .await
    }

    async fn produce_accusation(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError> {
        self.respond(CallKind::Accusation, context, &self.accusations, || {
            Ok(serde_json::json!({
                "accused": candidates[0].name,
                "rationale": "The evidence points there."
            })
            .to_string())
        })
        .await
    }

    async fn answer_private(
        &self,
        _question: &str,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        self.respond(CallKind::PrivateAnswer, context, &self.answers, || {
            Ok("The study was locked all evening.".to_owned())
        })
        .await
    }
}
