//! Stage controller: the game's finite-state machine.
//!
//! Each call to [`GameSession::advance`] performs exactly one step: phase
//! entry setup, one actor's turn, or a transition. A step is planned under
//! the state lock, any slow decision is requested with the lock released,
//! and the result is applied under the lock again. Only the active driver
//! changes the stage, turn order and cursor, so a plan stays valid across
//! the await; appliers still re-check the stage before mutating.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::application::gateway::{DecisionRequest, Dispatch};
use crate::application::ports::{
    Candidate, DecisionContext, ProviderError, StatementPurpose, StatementRequest,
};
use crate::application::serializer::Advancement;
use crate::application::session::GameSession;
use crate::config::EngineConfig;
use crate::domain::decisions::PendingAction;
use crate::domain::events::{Audience, EngineEventKind};
use crate::domain::ledger::{MessageKind, NewEntry};
use crate::domain::roster::{Participant, ParticipantId, ParticipantKind};
use crate::domain::stage::Stage;
use crate::domain::state::{GameState, RevealProgress, Statement};
use crate::domain::turns::TurnOrder;
use crate::domain::validator::{
    ValidationFailure, validate_accusation, validate_turn_order, validate_vote,
};

/// One planned step.
enum Plan {
    /// Already applied under the lock.
    Done(Advancement),
    TurnOrder {
        stage: Stage,
        context: DecisionContext,
    },
    Turn {
        stage: Stage,
        actor: Participant,
        purpose: StatementPurpose,
        context: DecisionContext,
    },
    ClueReactions {
        stage: Stage,
        reactions: Vec<(Participant, DecisionContext)>,
    },
    Pause {
        stage: Stage,
        duration: Duration,
    },
    Vote {
        stage: Stage,
        voter: Participant,
        candidates: Vec<Candidate>,
        context: DecisionContext,
    },
    Accusation {
        stage: Stage,
        accuser: Participant,
        candidates: Vec<Candidate>,
        context: DecisionContext,
    },
    Reveal {
        from: RevealProgress,
        purpose: StatementPurpose,
        pause: Duration,
        context: DecisionContext,
    },
}

impl GameSession {
    /// Performs one step of the state machine.
    ///
    /// Callers normally go through [`GameSession::request_advance`], which
    /// serializes drivers; calling this directly bypasses that exclusion.
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub async fn advance(&self) -> Advancement {
        let plan = self
            .apply(|state, now| plan_step(state, now, &self.config))
            .await;

        let advancement = match plan {
            Plan::Done(advancement) => advancement,
            Plan::TurnOrder { stage, context } => self.generate_turn_order(stage, context).await,
            Plan::Turn {
                stage,
                actor,
                purpose,
                context,
            } => self.take_turn(stage, actor, purpose, context).await,
            Plan::ClueReactions { stage, reactions } => {
                self.react_to_clues(stage, reactions).await
            }
            Plan::Pause { stage, duration } => {
                if !duration.is_zero() {
                    debug!(?duration, %stage, "pausing before transition");
                    tokio::time::sleep(duration).await;
                }
                self.apply(|state, now| {
                    if state.stage == stage {
                        transition(state, now)
                    } else {
                        Advancement::Progressed
                    }
                })
                .await
            }
            Plan::Vote {
                stage,
                voter,
                candidates,
                context,
            } => self.collect_vote(stage, voter, candidates, context).await,
            Plan::Accusation {
                stage,
                accuser,
                candidates,
                context,
            } => {
                self.collect_accusation(stage, accuser, candidates, context)
                    .await
            }
            Plan::Reveal {
                from,
                purpose,
                pause,
                context,
            } => self.reveal(from, purpose, pause, context).await,
        };
        debug!(?advancement, "advance step complete");
        advancement
    }

    /// Requests a decision with fresh memory attached to the context.
    async fn decide(
        &self,
        actor: &Participant,
        request: DecisionRequest<'_>,
        mut context: DecisionContext,
    ) -> Dispatch {
        context.memory = self.memory.recall(self.config.memory_recall_limit).await;
        self.gateway
            .request(actor.kind, &actor.id, request, &context)
            .await
    }

    async fn generate_turn_order(&self, stage: Stage, context: DecisionContext) -> Advancement {
        let narrator = self.read(|state| state.roster().narrator().clone());
        self.apply(|state, now| begin_decision(state, &narrator, now))
            .await;
        let request = StatementRequest::new(StatementPurpose::TurnOrder);
        let dispatch = self
            .decide(&narrator, DecisionRequest::Statement(&request), context)
            .await;
        let reply = match dispatch {
            Dispatch::Reply(reply) => reply,
            Dispatch::AwaitHuman(_) => Err(ProviderError::Unavailable(
                "narrator cannot be human".to_owned(),
            )),
        };

        self.apply(|state, now| {
            finish_decision(state, &narrator.id, now);
            if state.stage != stage || !state.turns.is_empty() {
                return Advancement::Progressed;
            }
            let decision = validate_turn_order(provider_reply(&reply), &state.roster);
            info!(
                %stage,
                origin = ?decision.origin,
                order = ?decision.order,
                "turn order set"
            );
            state.turns = TurnOrder::new(decision.order.clone());
            state.emit(
                EngineEventKind::TurnOrderSet {
                    order: decision.order,
                    announcement: decision.announcement.clone(),
                },
                Audience::Everyone,
                now,
            );
            state.narrate(decision.announcement, MessageKind::Chat, now);
            announce_turn(state, now);
            Advancement::Progressed
        })
        .await
    }

    async fn take_turn(
        &self,
        stage: Stage,
        actor: Participant,
        purpose: StatementPurpose,
        context: DecisionContext,
    ) -> Advancement {
        let request = StatementRequest::new(purpose);
        let dispatch = self
            .decide(&actor, DecisionRequest::Statement(&request), context)
            .await;
        match dispatch {
            Dispatch::AwaitHuman(action) => {
                self.apply(|state, now| {
                    if state.stage == stage && state.pending.is_none() {
                        info!(participant = %action.participant, "awaiting human statement");
                        state.open_pending(action, now);
                    }
                    Advancement::Progressed
                })
                .await
            }
            Dispatch::Reply(reply) => {
                let text = statement_text(reply, &actor);
                self.apply(|state, now| {
                    finish_decision(state, &actor.id, now);
                    if state.stage != stage || state.turns.current() != Some(&actor.id) {
                        return Advancement::Progressed;
                    }
                    state.append(
                        NewEntry::public(
                            actor.id.clone(),
                            actor.name.clone(),
                            text.clone(),
                            MessageKind::Chat,
                        ),
                        now,
                    );
                    state.statements.push(Statement {
                        participant: actor.id.clone(),
                        text,
                    });
                    state.turns.advance_cursor();
                    announce_turn(state, now);
                    Advancement::Progressed
                })
                .await
            }
        }
    }

    async fn react_to_clues(
        &self,
        stage: Stage,
        reactions: Vec<(Participant, DecisionContext)>,
    ) -> Advancement {
        let request = StatementRequest::new(StatementPurpose::ClueReaction);
        for (actor, context) in reactions {
            self.apply(|state, now| begin_decision(state, &actor, now))
                .await;
            let dispatch = self
                .decide(&actor, DecisionRequest::Statement(&request), context)
                .await;
            let Dispatch::Reply(reply) = dispatch else {
                continue;
            };
            let text = statement_text(reply, &actor);
            self.apply(|state, now| {
                finish_decision(state, &actor.id, now);
                if state.stage == stage {
                    state.append(
                        NewEntry::public(
                            actor.id.clone(),
                            actor.name.clone(),
                            text,
                            MessageKind::Chat,
                        ),
                        now,
                    );
                }
            })
            .await;
        }
        Advancement::Progressed
    }

    async fn collect_vote(
        &self,
        stage: Stage,
        voter: Participant,
        candidates: Vec<Candidate>,
        context: DecisionContext,
    ) -> Advancement {
        let dispatch = self
            .decide(&voter, DecisionRequest::Vote(&candidates), context)
            .await;
        match dispatch {
            Dispatch::AwaitHuman(action) => self.await_human(stage, action).await,
            Dispatch::Reply(reply) => {
                self.apply(|state, now| {
                    finish_decision(state, &voter.id, now);
                    if state.stage != stage || state.votes.contains_key(&voter.id) {
                        return Advancement::Progressed;
                    }
                    let vote = self.with_rng(|rng| {
                        validate_vote(provider_reply(&reply), &state.roster, &voter, rng)
                    });
                    info!(voter = %voter.id, origin = ?vote.origin, "vote recorded");
                    speak_rationale(state, &voter, &vote.rationale, now);
                    state.votes.insert(voter.id.clone(), vote);
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
                    Advancement::Progressed
                })
                .await
            }
        }
    }

    async fn collect_accusation(
        &self,
        stage: Stage,
        accuser: Participant,
        candidates: Vec<Candidate>,
        context: DecisionContext,
    ) -> Advancement {
        let dispatch = self
            .decide(&accuser, DecisionRequest::Accusation(&candidates), context)
            .await;
        match dispatch {
            Dispatch::AwaitHuman(action) => self.await_human(stage, action).await,
            Dispatch::Reply(reply) => {
                self.apply(|state, now| {
                    finish_decision(state, &accuser.id, now);
                    if state.stage != stage || state.accusations.contains_key(&accuser.id) {
                        return Advancement::Progressed;
                    }
                    let accusation = self.with_rng(|rng| {
                        validate_accusation(provider_reply(&reply), &state.roster, &accuser, rng)
                    });
                    info!(
                        accuser = %accuser.id,
                        origin = ?accusation.origin,
                        "accusation recorded"
                    );
                    speak_rationale(state, &accuser, &accusation.rationale, now);
                    state.accusations.insert(accuser.id.clone(), accusation);
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
                    Advancement::Progressed
                })
                .await
            }
        }
    }

    async fn await_human(
        &self,
        stage: Stage,
        action: PendingAction,
    ) -> Advancement {
        self.apply(|state, now| {
            if state.stage != stage || state.pending.is_some() {
                return Advancement::Suspended;
            }
            info!(participant = %action.participant, kind = ?action.kind, "awaiting human decision");
            state.open_pending(action, now);
            Advancement::Progressed
        })
        .await
    }

    async fn reveal(
        &self,
        from: RevealProgress,
        purpose: StatementPurpose,
        pause: Duration,
        context: DecisionContext,
    ) -> Advancement {
        if !pause.is_zero() {
            debug!(?pause, "pausing before reveal");
            tokio::time::sleep(pause).await;
        }
        let narrator = self.read(|state| state.roster().narrator().clone());
        self.apply(|state, now| begin_decision(state, &narrator, now))
            .await;
        let request = StatementRequest::new(purpose);
        let dispatch = self
            .decide(&narrator, DecisionRequest::Statement(&request), context)
            .await;
        let reply = match dispatch {
            Dispatch::Reply(reply) => reply,
            Dispatch::AwaitHuman(_) => Err(ProviderError::Unavailable(
                "narrator cannot be human".to_owned(),
            )),
        };

        self.apply(|state, now| {
            finish_decision(state, &narrator.id, now);
            if state.reveal != from {
                return Advancement::Progressed;
            }
            let text = match reply.map(|text| text.trim().to_owned()) {
                Ok(text) if !text.is_empty() => text,
                outcome => {
                    warn!(?purpose, ?outcome, "reveal unavailable, using templated text");
                    if purpose == StatementPurpose::RevealTruth {
                        truth_fallback(state)
                    } else {
                        scoring_fallback(state)
                    }
                }
            };
            state.narrate(text, MessageKind::NarratorReveal, now);
            state.reveal = match from {
                RevealProgress::TruthRevealed | RevealProgress::ScoringRevealed => {
                    RevealProgress::ScoringRevealed
                }
                RevealProgress::NotStarted | RevealProgress::Summarized => {
                    RevealProgress::TruthRevealed
                }
            };
            info!(?purpose, "narrator reveal appended");
            Advancement::Progressed
        })
        .await
    }
}

fn plan_step(state: &mut GameState, now: DateTime<Utc>, config: &EngineConfig) -> Plan {
    match state.stage {
        Stage::Waiting => {
            let designated = state.roster.designated_human();
            let online = state.roster.get(designated).is_some_and(|p| p.online);
            if online {
                Plan::Done(transition(state, now))
            } else {
                Plan::Done(Advancement::Idle)
            }
        }
        stage @ (Stage::Alibi | Stage::Discussion(_)) => plan_turn(state, stage, now),
        Stage::Investigation(round) => {
            if state.clues_distributed {
                return Plan::Pause {
                    stage: state.stage,
                    duration: config.investigation_pause,
                };
            }
            state.clues_distributed = true;
            let reactions = distribute_clues(state, round, now);
            Plan::ClueReactions {
                stage: state.stage,
                reactions,
            }
        }
        Stage::Voting(_) => plan_vote(state, now),
        Stage::FinalAccusation => plan_accusation(state, now, config),
        Stage::Resolved => Plan::Done(Advancement::Idle),
    }
}

fn plan_turn(state: &mut GameState, stage: Stage, now: DateTime<Utc>) -> Plan {
    if state.turns.is_empty() {
        let narrator = state.roster.narrator().clone();
        let roster_note = state
            .roster
            .suspects()
            .map(|p| format!("{}: {}", p.id, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let context = context_for(
            state,
            &narrator,
            Some(format!(
                "Order the suspects for {}. Suspects (id: name): {roster_note}",
                stage.label()
            )),
        );
        return Plan::TurnOrder { stage, context };
    }
    if state.pending.is_some() {
        return Plan::Done(Advancement::Suspended);
    }
    if let Some(statement) = state.recorded_statement.take() {
        debug!(participant = %statement.participant, "consuming recorded statement");
        state.statements.push(statement);
        state.turns.advance_cursor();
        announce_turn(state, now);
        return Plan::Done(Advancement::Progressed);
    }
    let Some(actor) = state
        .turns
        .current()
        .and_then(|id| state.roster.get(id))
        .cloned()
    else {
        return Plan::Done(transition(state, now));
    };
    let purpose = if stage == Stage::Alibi {
        StatementPurpose::Alibi
    } else {
        StatementPurpose::Discussion
    };
    begin_decision(state, &actor, now);
    let context = context_for(state, &actor, None);
    Plan::Turn {
        stage,
        actor,
        purpose,
        context,
    }
}

/// Hands out round clues by clue key; returns the autonomous suspects that
/// should react immediately.
fn distribute_clues(
    state: &mut GameState,
    round: u8,
    now: DateTime<Utc>,
) -> Vec<(Participant, DecisionContext)> {
    let deliveries: Vec<(ParticipantId, Vec<String>)> = state
        .roster
        .suspects()
        .filter_map(|suspect| {
            let clues = state.clues.clues_for(round, &suspect.clue_key);
            if clues.is_empty() {
                debug!(participant = %suspect.id, round, "no clues for suspect this round");
                None
            } else {
                Some((suspect.id.clone(), clues.to_vec()))
            }
        })
        .collect();

    let narrator = state.roster.narrator().clone();
    let mut reactions = Vec::new();
    for (id, clues) in deliveries {
        let Some(participant) = state.roster.get_mut(&id) else {
            continue;
        };
        participant.clues.extend(clues.iter().cloned());
        let participant = participant.clone();
        info!(participant = %id, round, count = clues.len(), "clues delivered");

        state.emit(
            EngineEventKind::CluesDelivered {
                participant: id.clone(),
                round,
                clues: clues.clone(),
            },
            Audience::Participant(id.clone()),
            now,
        );
        let listing = clues.join("\n- ");
        state.append(
            NewEntry::private(
                narrator.id.clone(),
                narrator.name.clone(),
                format!("Your clues for round {round}:\n- {listing}"),
                id,
            ),
            now,
        );
        if participant.kind == ParticipantKind::Autonomous {
            let note = format!("You just found these clues:\n- {listing}");
            let context = context_for(state, &participant, Some(note));
            reactions.push((participant, context));
        }
    }
    reactions
}

/// Next suspect to decide: the first without a decision who is not already
/// pending. Humans wait while another pending action is open.
fn next_decider<'a>(
    state: &'a GameState,
    decided: impl Fn(&ParticipantId) -> bool,
) -> Option<&'a Participant> {
    let pending = state.pending.as_ref();
    state.roster.suspects().find(|p| {
        !decided(&p.id)
            && pending.is_none_or(|action| action.participant != p.id && !p.is_human())
    })
}

fn candidates_for(state: &GameState, chooser: &ParticipantId) -> Vec<Candidate> {
    state
        .roster
        .candidates_for(chooser)
        .into_iter()
        .map(|p| Candidate {
            id: p.id.clone(),
            name: p.name.clone(),
        })
        .collect()
}

fn plan_vote(state: &mut GameState, now: DateTime<Utc>) -> Plan {
    if state.votes_complete() {
        let summary = vote_summary(state);
        state.brief(format!("Narrator briefing. {summary}"));
        state.narrate(summary, MessageKind::System, now);
        return Plan::Done(transition(state, now));
    }
    let Some(voter) = next_decider(state, |id| state.votes.contains_key(id)).cloned() else {
        return Plan::Done(Advancement::Suspended);
    };
    begin_decision(state, &voter, now);
    Plan::Vote {
        stage: state.stage,
        candidates: candidates_for(state, &voter.id),
        context: context_for(state, &voter, None),
        voter,
    }
}

fn plan_accusation(state: &mut GameState, now: DateTime<Utc>, config: &EngineConfig) -> Plan {
    if state.accusations_complete() {
        return plan_reveal(state, now, config);
    }
    let Some(accuser) =
        next_decider(state, |id| state.accusations.contains_key(id)).cloned()
    else {
        return Plan::Done(Advancement::Suspended);
    };
    begin_decision(state, &accuser, now);
    Plan::Accusation {
        stage: state.stage,
        candidates: candidates_for(state, &accuser.id),
        context: context_for(state, &accuser, None),
        accuser,
    }
}

/// The closing sequence: accusation summary, truth, then scoring after a
/// pause. The game only resolves once the scoring reveal is in the ledger.
fn plan_reveal(state: &mut GameState, now: DateTime<Utc>, config: &EngineConfig) -> Plan {
    let (purpose, pause) = match state.reveal {
        RevealProgress::NotStarted => {
            let summary = accusation_summary(state);
            state.brief(format!("Narrator briefing. {summary}"));
            state.narrate(summary, MessageKind::System, now);
            state.reveal = RevealProgress::Summarized;
            (StatementPurpose::RevealTruth, Duration::ZERO)
        }
        RevealProgress::Summarized => (StatementPurpose::RevealTruth, Duration::ZERO),
        RevealProgress::TruthRevealed => (StatementPurpose::RevealScoring, config.reveal_pause),
        RevealProgress::ScoringRevealed => return Plan::Done(transition(state, now)),
    };
    let narrator = state.roster.narrator().clone();
    let context = context_for(state, &narrator, Some(accusation_summary(state)));
    Plan::Reveal {
        from: state.reveal,
        purpose,
        pause,
        context,
    }
}

/// Moves to the next stage in the fixed sequence.
fn transition(state: &mut GameState, now: DateTime<Utc>) -> Advancement {
    let from = state.stage;
    let Some(to) = from.next() else {
        return Advancement::Idle;
    };
    if state.enter_stage(to, now) {
        info!(%from, %to, "stage transition");
        Advancement::Transitioned { from, to }
    } else {
        Advancement::Idle
    }
}

fn context_for(state: &GameState, participant: &Participant, note: Option<String>) -> DecisionContext {
    DecisionContext {
        participant_id: participant.id.clone(),
        participant_name: participant.name.clone(),
        stage: Some(state.stage),
        clues: participant.clues.clone(),
        dossier: state.dossier(&participant.id).to_owned(),
        memory: Vec::new(),
        note,
    }
}

/// Announces the current actor, with a system line naming them.
fn announce_turn(state: &mut GameState, now: DateTime<Utc>) {
    state.announce_current_actor(now);
    if let Some(id) = state.turns.current().cloned() {
        let name = state.roster.name_of(&id);
        state.narrate(format!("It is now {name}'s turn."), MessageKind::System, now);
    }
}

/// Posts an autonomous voter's or accuser's reasoning as their own chat line.
fn speak_rationale(
    state: &mut GameState,
    actor: &Participant,
    rationale: &str,
    now: DateTime<Utc>,
) {
    if rationale.trim().is_empty() {
        return;
    }
    state.append(
        NewEntry::public(
            actor.id.clone(),
            actor.name.clone(),
            rationale.trim(),
            MessageKind::Chat,
        ),
        now,
    );
}

/// Marks an autonomous decision as in flight.
fn begin_decision(state: &mut GameState, actor: &Participant, now: DateTime<Utc>) {
    if actor.kind == ParticipantKind::Autonomous {
        state.in_flight = Some(actor.id.clone());
        state.emit(
            EngineEventKind::TypingStarted {
                participant: actor.id.clone(),
            },
            Audience::Everyone,
            now,
        );
    }
}

fn finish_decision(state: &mut GameState, actor: &ParticipantId, now: DateTime<Utc>) {
    if state.in_flight.as_ref() == Some(actor) {
        state.in_flight = None;
        state.emit(
            EngineEventKind::TypingStopped {
                participant: actor.clone(),
            },
            Audience::Everyone,
            now,
        );
    }
}

fn provider_reply(reply: &Result<String, ProviderError>) -> Result<&str, ValidationFailure> {
    reply
        .as_deref()
        .map_err(|e| ValidationFailure::ProviderUnavailable(e.to_string()))
}

/// The provider's statement, or a placeholder when it failed or was blank.
fn statement_text(reply: Result<String, ProviderError>, actor: &Participant) -> String {
    match reply {
        Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
        Ok(_) => {
            warn!(participant = %actor.id, "empty statement, using placeholder");
            placeholder(actor)
        }
        Err(error) => {
            warn!(participant = %actor.id, %error, "statement unavailable, using placeholder");
            placeholder(actor)
        }
    }
}

fn placeholder(actor: &Participant) -> String {
    format!("({} hesitates and says nothing.)", actor.name)
}

fn vote_summary(state: &GameState) -> String {
    let lines: Vec<String> = state
        .roster
        .suspects()
        .filter_map(|voter| {
            state.votes.get(&voter.id).map(|vote| {
                format!(
                    "{} trusts {} and suspects {}",
                    voter.name,
                    state.roster.name_of(&vote.trust),
                    state.roster.name_of(&vote.suspect)
                )
            })
        })
        .collect();
    format!("Voting results: {}.", lines.join("; "))
}

fn accusation_summary(state: &GameState) -> String {
    let lines: Vec<String> = state
        .roster
        .suspects()
        .filter_map(|accuser| {
            state.accusations.get(&accuser.id).map(|accusation| {
                format!(
                    "{} accuses {}",
                    accuser.name,
                    state.roster.name_of(&accusation.accused)
                )
            })
        })
        .collect();
    format!("Final accusations: {}.", lines.join("; "))
}

fn truth_fallback(state: &GameState) -> String {
    match &state.culprit {
        Some(culprit) => format!(
            "The truth is out: {} is the culprit.",
            state.roster.name_of(culprit)
        ),
        None => "The narrator closes the case file. The truth stays buried.".to_owned(),
    }
}

fn scoring_fallback(state: &GameState) -> String {
    let Some(culprit) = &state.culprit else {
        return accusation_summary(state);
    };
    let correct: Vec<String> = state
        .roster
        .suspects()
        .filter(|p| {
            state
                .accusations
                .get(&p.id)
                .is_some_and(|a| &a.accused == culprit)
        })
        .map(|p| p.name.clone())
        .collect();
    if correct.is_empty() {
        "Nobody identified the culprit.".to_owned()
    } else {
        format!("Correct accusations: {}.", correct.join(", "))
    }
}
