//! Uniform decision requests over human and autonomous participants.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::application::ports::{
    Candidate, DecisionContext, DecisionProvider, ProviderError, StatementRequest,
};
use crate::domain::decisions::{ActionKind, PendingAction};
use crate::domain::roster::{ParticipantId, ParticipantKind};

/// What is being asked of a participant.
#[derive(Debug, Clone, Copy)]
pub enum DecisionRequest<'a> {
    Statement(&'a StatementRequest),
    Vote(&'a [Candidate]),
    Accusation(&'a [Candidate]),
}

impl DecisionRequest<'_> {
    fn action_kind(&self) -> ActionKind {
        match self {
            Self::Statement(_) => ActionKind::Statement,
            Self::Vote(_) => ActionKind::Vote,
            Self::Accusation(_) => ActionKind::Accusation,
        }
    }
}

/// Outcome of a gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A human must act; the controller records the pending action.
    AwaitHuman(PendingAction),
    /// The autonomous provider's raw reply, or why there is none.
    Reply(Result<String, ProviderError>),
}

/// Routes decision requests by participant kind.
#[derive(Clone)]
pub struct DecisionGateway {
    providers: HashMap<ParticipantId, Arc<dyn DecisionProvider>>,
    timeout: Duration,
}

impl std::fmt::Debug for DecisionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionGateway")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DecisionGateway {
    /// Creates a gateway with no providers registered.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            timeout,
        }
    }

    /// Registers the provider for an autonomous participant.
    #[must_use]
    pub fn with_provider(
        mut self,
        participant: ParticipantId,
        provider: Arc<dyn DecisionProvider>,
    ) -> Self {
        self.providers.insert(participant, provider);
        self
    }

    /// Whether a provider is registered for `participant`.
    #[must_use]
    pub fn has_provider(&self, participant: &ParticipantId) -> bool {
        self.providers.contains_key(participant)
    }

    /// Requests a decision from `participant`.
    ///
    /// Humans yield a pending action immediately. Autonomous participants are
    /// asked through their provider, bounded by the decision timeout.
    pub async fn request(
        &self,
        kind: ParticipantKind,
        participant: &ParticipantId,
        request: DecisionRequest<'_>,
        context: &DecisionContext,
    ) -> Dispatch {
        match kind {
            ParticipantKind::Human => Dispatch::AwaitHuman(PendingAction::new(
                request.action_kind(),
                participant.clone(),
            )),
            ParticipantKind::Autonomous => {
                let Some(provider) = self.providers.get(participant) else {
                    return Dispatch::Reply(Err(ProviderError::Unavailable(format!(
                        "no provider registered for {participant}"
                    ))));
                };
                debug!(%participant, ?request, "requesting autonomous decision");
                let call = async {
                    match request {
                        DecisionRequest::Statement(statement) => {
                            provider.produce_statement(statement, context).await
                        }
                        DecisionRequest::Vote(candidates) => {
                            provider.produce_vote(context, candidates).await
                        }
                        DecisionRequest::Accusation(candidates) => {
                            provider.produce_accusation(context, candidates).await
                        }
                    }
                };
                Dispatch::Reply(self.bounded(participant, call).await)
            }
        }
    }

    /// Asks the narrator's provider to answer a private question.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if no provider is registered, the call fails,
    /// or it exceeds the decision timeout.
    pub async fn answer_private(
        &self,
        narrator: &ParticipantId,
        question: &str,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        let provider = self.providers.get(narrator).ok_or_else(|| {
            ProviderError::Unavailable(format!("no provider registered for {narrator}"))
        })?;
        self.bounded(narrator, provider.answer_private(question, context))
            .await
    }

    async fn bounded(
        &self,
        participant: &ParticipantId,
        call: impl Future<Output = Result<String, ProviderError>>,
    ) -> Result<String, ProviderError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                warn!(%participant, timeout = ?self.timeout, "decision provider timed out");
                Err(ProviderError::Timeout)
            })
    }
}
