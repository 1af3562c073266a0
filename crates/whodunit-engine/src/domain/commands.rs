//! Inbound commands a transport submits to a game session.

use uuid::Uuid;
use whodunit_core::command::Command;

/// Marks a participant as connected.
#[derive(Debug, Clone)]
pub struct Connect {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The connecting participant.
    pub participant_id: String,
}

/// Marks a participant as disconnected.
#[derive(Debug, Clone)]
pub struct Disconnect {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The disconnecting participant.
    pub participant_id: String,
}

/// A human statement for the current turn.
#[derive(Debug, Clone)]
pub struct SubmitStatement {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The speaking participant.
    pub participant_id: String,
    /// What they said.
    pub text: String,
}

/// A human trust/suspect vote.
#[derive(Debug, Clone)]
pub struct SubmitVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The voter.
    pub participant_id: String,
    /// Id of the suspect the voter trusts most.
    pub trust_id: String,
    /// Id of the suspect the voter suspects most.
    pub suspect_id: String,
    /// Free-text reasoning.
    pub rationale: String,
}

/// A human final accusation.
#[derive(Debug, Clone)]
pub struct SubmitAccusation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The accuser.
    pub participant_id: String,
    /// Id of the accused suspect.
    pub accused_id: String,
    /// Free-text reasoning.
    pub rationale: String,
}

/// Shares one of the participant's private clues with everyone.
#[derive(Debug, Clone)]
pub struct PublishClue {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The publishing participant.
    pub participant_id: String,
    /// Text of a clue the participant holds.
    pub clue: String,
}

/// A private question for the narrator.
#[derive(Debug, Clone)]
pub struct AskPrivately {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The asking participant.
    pub participant_id: String,
    /// The question.
    pub question: String,
}

macro_rules! impl_command {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(
            impl Command for $ty {
                fn command_type(&self) -> &'static str {
                    $name
                }

                fn correlation_id(&self) -> Uuid {
                    self.correlation_id
                }

                fn participant_id(&self) -> &str {
                    &self.participant_id
                }
            }
        )+
    };
}

impl_command! {
    Connect => "engine.connect",
    Disconnect => "engine.disconnect",
    SubmitStatement => "engine.submit_statement",
    SubmitVote => "engine.submit_vote",
    SubmitAccusation => "engine.submit_accusation",
    PublishClue => "engine.publish_clue",
    AskPrivately => "engine.private_question",
}
