//! Command handlers for inbound participant operations.
//!
//! Each handler validates the command against the current state and applies
//! it under the state lock. Gameplay misbehavior is reported through
//! [`SubmissionOutcome`] without mutating anything; only addressing mistakes
//! on presence and private operations surface as `DomainError`.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use whodunit_core::command::Command;
use whodunit_core::error::DomainError;

use crate::application::ports::DecisionContext;
use crate::application::serializer::DriveReport;
use crate::application::session::GameSession;
use crate::domain::commands::{
    AskPrivately, Connect, Disconnect, PublishClue, SubmitAccusation, SubmitStatement, SubmitVote,
};
use crate::domain::decisions::{Accusation, ActionKind, DecisionOrigin, PublicClue, Vote};
use crate::domain::events::{Audience, EngineEventKind};
use crate::domain::ledger::{MessageKind, NewEntry};
use crate::domain::roster::{Participant, ParticipantId};
use crate::domain::stage::Stage;
use crate::domain::state::{GameState, Statement};

/// Why an ignored submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Out of turn, wrong kind, or wrong stage.
    ProtocolViolation,
    /// The participant already made this decision.
    DuplicateSubmission,
}

/// Why a submission payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "rejection", content = "detail", rename_all = "snake_case")]
pub enum SubmissionRejection {
    /// An id in the payload is not on the roster.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// The named participant cannot be chosen (the narrator, or oneself).
    #[error("participant cannot be chosen: {0}")]
    IneligibleChoice(String),

    /// A vote named the same participant for trust and suspect.
    #[error("trust and suspect must differ")]
    SameTrustAndSuspect,

    /// A statement or question was blank.
    #[error("text must not be empty")]
    EmptyText,

    /// The participant does not hold the clue they tried to publish.
    #[error("clue not held by participant")]
    ClueNotHeld,
}

/// Result of an inbound submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Recorded; the caller should request an advance.
    Accepted,
    /// Well-formed but not applicable now; nothing changed.
    Ignored(IgnoreReason),
    /// Malformed; nothing changed.
    Rejected(SubmissionRejection),
}

impl SubmissionOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Result of a presence change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceOutcome {
    /// Whether the participant is now online.
    pub online: bool,
    /// The drive performed when this connection started the game.
    pub drive: Option<DriveReport>,
}

fn ignored(command: &dyn Command, reason: IgnoreReason) -> SubmissionOutcome {
    warn!(
        command = command.command_type(),
        participant = command.participant_id(),
        ?reason,
        "submission ignored"
    );
    SubmissionOutcome::Ignored(reason)
}

fn rejected(command: &dyn Command, rejection: SubmissionRejection) -> SubmissionOutcome {
    warn!(
        command = command.command_type(),
        participant = command.participant_id(),
        %rejection,
        "submission rejected"
    );
    SubmissionOutcome::Rejected(rejection)
}

/// Resolves a chosen id to an eligible suspect other than `chooser`.
fn resolve_choice<'a>(
    state: &'a GameState,
    chooser: &ParticipantId,
    raw: &str,
) -> Result<&'a Participant, SubmissionRejection> {
    let chosen = state
        .roster
        .require(raw)
        .map_err(|_| SubmissionRejection::UnknownParticipant(raw.to_owned()))?;
    if state
        .roster
        .candidates_for(chooser)
        .iter()
        .any(|p| p.id == chosen.id)
    {
        Ok(chosen)
    } else {
        Err(SubmissionRejection::IneligibleChoice(raw.to_owned()))
    }
}

/// Checks that `pending` awaits `kind` from `participant`.
fn matches_pending(state: &GameState, kind: ActionKind, participant: &ParticipantId) -> bool {
    state
        .pending
        .as_ref()
        .is_some_and(|pending| pending.matches(kind, participant))
}

/// Handles `Connect`: marks the participant online and, if this connection
/// is the designated human's while waiting, drives the game forward.
///
/// # Errors
///
/// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
#[instrument(skip(session), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_connect(
    command: &Connect,
    session: &GameSession,
) -> Result<PresenceOutcome, DomainError> {
    let starts_game = session
        .apply(|state, now| set_presence(state, &command.participant_id, true, now))
        .await?;
    info!("participant connected");
    let drive = if starts_game {
        info!("designated human connected, starting game");
        Some(session.request_advance().await)
    } else {
        None
    };
    Ok(PresenceOutcome {
        online: true,
        drive,
    })
}

/// Handles `Disconnect`: marks the participant offline.
///
/// # Errors
///
/// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
#[instrument(skip(session), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_disconnect(
    command: &Disconnect,
    session: &GameSession,
) -> Result<PresenceOutcome, DomainError> {
    session
        .apply(|state, now| set_presence(state, &command.participant_id, false, now))
        .await?;
    info!("participant disconnected");
    Ok(PresenceOutcome {
        online: false,
        drive: None,
    })
}

/// Updates presence; returns whether the game should start.
fn set_presence(
    state: &mut GameState,
    raw_id: &str,
    online: bool,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool, DomainError> {
    let id = state.roster.require(raw_id)?.id.clone();
    let Some(participant) = state.roster.get_mut(&id) else {
        return Err(DomainError::UnknownParticipant(raw_id.to_owned()));
    };
    participant.online = online;
    let name = participant.name.clone();
    state.emit(
        EngineEventKind::PresenceChanged {
            participant: id.clone(),
            online,
        },
        Audience::Everyone,
        now,
    );
    let line = if online {
        format!("{name} joined the table.")
    } else {
        format!("{name} left the table.")
    };
    state.narrate(line, MessageKind::System, now);
    Ok(online && state.stage == Stage::Waiting && state.roster.designated_human() == &id)
}

/// Handles `SubmitStatement` for the pending human turn.
///
/// The statement is appended at once; the next advance consumes it and
/// moves the cursor.
#[instrument(skip(session, command), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_submit_statement(
    command: &SubmitStatement,
    session: &GameSession,
) -> SubmissionOutcome {
    session
        .apply(|state, now| {
            let Ok(speaker) = state.roster.require(&command.participant_id).cloned() else {
                return rejected(
                    command,
                    SubmissionRejection::UnknownParticipant(command.participant_id.clone()),
                );
            };
            if !matches_pending(state, ActionKind::Statement, &speaker.id) {
                let already_spoke = state.statements.iter().any(|s| s.participant == speaker.id)
                    || state
                        .recorded_statement
                        .as_ref()
                        .is_some_and(|s| s.participant == speaker.id);
                let reason = if state.stage.is_turn_based() && already_spoke {
                    IgnoreReason::DuplicateSubmission
                } else {
                    IgnoreReason::ProtocolViolation
                };
                return ignored(command, reason);
            }
            let text = command.text.trim();
            if text.is_empty() {
                return rejected(command, SubmissionRejection::EmptyText);
            }

            state.clear_pending(now);
            state.append(
                NewEntry::public(
                    speaker.id.clone(),
                    speaker.name.clone(),
                    text,
                    MessageKind::Chat,
                ),
                now,
            );
            state.recorded_statement = Some(Statement {
                participant: speaker.id,
                text: text.to_owned(),
            });
            info!("statement accepted");
            SubmissionOutcome::Accepted
        })
        .await
}

/// Handles `SubmitVote` for the pending human vote.
#[instrument(skip(session, command), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_submit_vote(command: &SubmitVote, session: &GameSession) -> SubmissionOutcome {
    session
        .apply(|state, now| {
            let Ok(voter) = state.roster.require(&command.participant_id).cloned() else {
                return rejected(
                    command,
                    SubmissionRejection::UnknownParticipant(command.participant_id.clone()),
                );
            };
            if matches!(state.stage, Stage::Voting(_)) && state.votes.contains_key(&voter.id) {
                return ignored(command, IgnoreReason::DuplicateSubmission);
            }
            if !matches_pending(state, ActionKind::Vote, &voter.id) {
                return ignored(command, IgnoreReason::ProtocolViolation);
            }
            let choice = resolve_choice(state, &voter.id, &command.trust_id).and_then(|trust| {
                let suspect = resolve_choice(state, &voter.id, &command.suspect_id)?;
                if trust.id == suspect.id {
                    Err(SubmissionRejection::SameTrustAndSuspect)
                } else {
                    Ok((trust.id.clone(), suspect.id.clone()))
                }
            });
            let (trust, suspect) = match choice {
                Ok(pair) => pair,
                Err(rejection) => return rejected(command, rejection),
            };

            state.clear_pending(now);
            state.votes.insert(
                voter.id.clone(),
                Vote {
                    trust,
                    suspect,
                    rationale: command.rationale.trim().to_owned(),
                    origin: DecisionOrigin::Human,
                },
            );
            state.emit(
                EngineEventKind::VotesUpdated {
                    votes: state.votes.clone(),
                },
                Audience::Everyone,
                now,
            );
            state.narrate(
                format!("{} has cast a vote.", voter.name),
                MessageKind::System,
                now,
            );
            info!("vote accepted");
            SubmissionOutcome::Accepted
        })
        .await
}

/// Handles `SubmitAccusation` for the pending human accusation.
#[instrument(skip(session, command), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_submit_accusation(
    command: &SubmitAccusation,
    session: &GameSession,
) -> SubmissionOutcome {
    session
        .apply(|state, now| {
            let Ok(accuser) = state.roster.require(&command.participant_id).cloned() else {
                return rejected(
                    command,
                    SubmissionRejection::UnknownParticipant(command.participant_id.clone()),
                );
            };
            if state.stage == Stage::FinalAccusation
                && state.accusations.contains_key(&accuser.id)
            {
                return ignored(command, IgnoreReason::DuplicateSubmission);
            }
            if !matches_pending(state, ActionKind::Accusation, &accuser.id) {
                return ignored(command, IgnoreReason::ProtocolViolation);
            }
            let accused = match resolve_choice(state, &accuser.id, &command.accused_id) {
                Ok(accused) => accused.id.clone(),
                Err(rejection) => return rejected(command, rejection),
            };

            state.clear_pending(now);
            state.accusations.insert(
                accuser.id.clone(),
                Accusation {
                    accused,
                    rationale: command.rationale.trim().to_owned(),
                    origin: DecisionOrigin::Human,
                },
            );
            state.emit(
                EngineEventKind::AccusationsUpdated {
                    accusations: state.accusations.clone(),
                },
                Audience::Everyone,
                now,
            );
            state.narrate(
                format!("{} has made an accusation.", accuser.name),
                MessageKind::System,
                now,
            );
            info!("accusation accepted");
            SubmissionOutcome::Accepted
        })
        .await
}

/// Handles `PublishClue`: shares a held clue on the public board.
///
/// # Errors
///
/// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
#[instrument(skip(session, command), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_publish_clue(
    command: &PublishClue,
    session: &GameSession,
) -> Result<SubmissionOutcome, DomainError> {
    session
        .apply(|state, now| {
            let publisher = state.roster.require(&command.participant_id)?.clone();
            let clue = command.clue.trim();
            if !publisher.clues.iter().any(|held| held == clue) {
                return Ok(rejected(command, SubmissionRejection::ClueNotHeld));
            }
            if state
                .public_clues
                .iter()
                .any(|c| c.publisher == publisher.id && c.content == clue)
            {
                return Ok(ignored(command, IgnoreReason::DuplicateSubmission));
            }

            state.public_clues.push(PublicClue {
                publisher: publisher.id.clone(),
                content: clue.to_owned(),
            });
            state.emit(
                EngineEventKind::PublicCluesUpdated {
                    clues: state.public_clues.clone(),
                },
                Audience::Everyone,
                now,
            );
            state.narrate(
                format!("{} shared a clue: {clue}", publisher.name),
                MessageKind::System,
                now,
            );
            info!("clue published");
            Ok(SubmissionOutcome::Accepted)
        })
        .await
}

/// Handles `AskPrivately`: relays a question to the narrator and records the
/// exchange as private entries addressed to the asker.
///
/// Returns the narrator's answer, or a templated one if the provider failed.
///
/// # Errors
///
/// Returns `DomainError::UnknownParticipant` if the id is not on the roster,
/// or `DomainError::Validation` if the question is blank.
#[instrument(skip(session, command), fields(session_id = %session.id(), participant = %command.participant_id))]
pub async fn handle_private_question(
    command: &AskPrivately,
    session: &GameSession,
) -> Result<String, DomainError> {
    let question = command.question.trim().to_owned();
    if question.is_empty() {
        return Err(DomainError::Validation("question must not be empty".to_owned()));
    }
    let (asker, narrator, context) = session.read(|state| {
        let asker = state.roster().require(&command.participant_id)?.clone();
        let narrator = state.roster().narrator().clone();
        let context = DecisionContext {
            participant_id: narrator.id.clone(),
            participant_name: narrator.name.clone(),
            stage: Some(state.stage()),
            clues: Vec::new(),
            dossier: state.dossier(&narrator.id).to_owned(),
            memory: Vec::new(),
            note: Some(format!(
                "{} asks privately. Their clues: {}",
                asker.name,
                asker.clues.join("; ")
            )),
        };
        Ok::<_, DomainError>((asker, narrator, context))
    })?;

    session
        .apply(|state, now| {
            state.append(
                NewEntry::private(asker.id.clone(), asker.name.clone(), &question, asker.id.clone()),
                now,
            );
        })
        .await;

    let mut context = context;
    context.memory = session
        .memory
        .recall(session.config.memory_recall_limit)
        .await;
    let answer = match session
        .gateway
        .answer_private(&narrator.id, &question, &context)
        .await
    {
        Ok(answer) if !answer.trim().is_empty() => answer.trim().to_owned(),
        outcome => {
            warn!(?outcome, "private answer unavailable, using templated reply");
            "The narrator has nothing to add on that right now.".to_owned()
        }
    };

    session
        .apply(|state, now| {
            state.append(
                NewEntry::private(narrator.id.clone(), narrator.name.clone(), &answer, asker.id.clone()),
                now,
            );
        })
        .await;
    info!("private question answered");
    Ok(answer)
}

impl GameSession {
    /// Marks a participant online; connecting the designated human while
    /// waiting starts the game and drives it until it settles.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
    pub async fn connect(&self, participant_id: &str) -> Result<PresenceOutcome, DomainError> {
        let command = Connect {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
        };
        handle_connect(&command, self).await
    }

    /// Marks a participant offline.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
    pub async fn disconnect(&self, participant_id: &str) -> Result<PresenceOutcome, DomainError> {
        let command = Disconnect {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
        };
        handle_disconnect(&command, self).await
    }

    /// Submits a human statement for the pending turn.
    pub async fn submit_statement(&self, participant_id: &str, text: &str) -> SubmissionOutcome {
        let command = SubmitStatement {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
            text: text.to_owned(),
        };
        handle_submit_statement(&command, self).await
    }

    /// Submits a human vote.
    pub async fn submit_vote(
        &self,
        participant_id: &str,
        trust_id: &str,
        suspect_id: &str,
        rationale: &str,
    ) -> SubmissionOutcome {
        let command = SubmitVote {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
            trust_id: trust_id.to_owned(),
            suspect_id: suspect_id.to_owned(),
            rationale: rationale.to_owned(),
        };
        handle_submit_vote(&command, self).await
    }

    /// Submits a human final accusation.
    pub async fn submit_accusation(
        &self,
        participant_id: &str,
        accused_id: &str,
        rationale: &str,
    ) -> SubmissionOutcome {
        let command = SubmitAccusation {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
            accused_id: accused_id.to_owned(),
            rationale: rationale.to_owned(),
        };
        handle_submit_accusation(&command, self).await
    }

    /// Shares one of the participant's clues with everyone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` if the id is not on the roster.
    pub async fn publish_clue(
        &self,
        participant_id: &str,
        clue: &str,
    ) -> Result<SubmissionOutcome, DomainError> {
        let command = PublishClue {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
            clue: clue.to_owned(),
        };
        handle_publish_clue(&command, self).await
    }

    /// Asks the narrator a private question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownParticipant` if the id is not on the
    /// roster, or `DomainError::Validation` if the question is blank.
    pub async fn private_question(
        &self,
        participant_id: &str,
        question: &str,
    ) -> Result<String, DomainError> {
        let command = AskPrivately {
            correlation_id: uuid::Uuid::new_v4(),
            participant_id: participant_id.to_owned(),
            question: question.to_owned(),
        };
        handle_private_question(&command, self).await
    }
}
