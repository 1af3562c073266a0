//! Structured response validation with deterministic fallback.
//!
//! Provider replies are free text that should contain one JSON object. The
//! validator extracts the first balanced object, decodes it into a typed
//! reply, checks it against the roster and, on any failure, substitutes a
//! fallback decision. Validation never fails outward; every fallback is
//! logged.

use std::collections::HashSet;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;
use whodunit_core::rng::{DeterministicRng, pick_index};

use super::decisions::{Accusation, DecisionOrigin, Vote};
use super::roster::{Participant, ParticipantId, Roster};

/// Why a reply could not be used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// The provider errored or timed out.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// No balanced `{...}` object in the reply.
    #[error("no structured object in reply")]
    NoStructuredObject,

    /// The object did not decode into the expected shape.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// A required text field was blank.
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),

    /// A name or id did not match an eligible participant.
    #[error("not an eligible participant: {0}")]
    Ineligible(String),

    /// A participant appeared twice in a turn order.
    #[error("duplicate participant in turn order: {0}")]
    Duplicate(String),

    /// Trust and suspect resolved to the same participant.
    #[error("trust and suspect must differ")]
    SameTrustAndSuspect,
}

/// A validated (or substituted) speaking order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOrderDecision {
    pub order: Vec<ParticipantId>,
    pub announcement: String,
    pub origin: DecisionOrigin,
}

#[derive(Debug, Deserialize)]
struct TurnOrderReply {
    turn_order: Vec<String>,
    announcement: String,
}

#[derive(Debug, Deserialize)]
struct VoteReply {
    trust: String,
    suspect: String,
    #[serde(default, alias = "statement")]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccusationReply {
    accused: String,
    #[serde(default, alias = "statement")]
    rationale: Option<String>,
}

/// Returns the first balanced top-level `{...}` in `raw`.
///
/// Braces inside JSON strings are ignored, as are escaped quotes.
#[must_use]
pub fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decode<T: DeserializeOwned>(raw: Result<&str, ValidationFailure>) -> Result<T, ValidationFailure> {
    let raw = raw?;
    let object = extract_object(raw).ok_or(ValidationFailure::NoStructuredObject)?;
    serde_json::from_str(object).map_err(|e| ValidationFailure::Malformed(e.to_string()))
}

fn rationale_or_default(rationale: Option<String>, chooser: &str) -> String {
    rationale
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("{chooser} kept their reasoning to themselves."))
}

fn resolve_name<'a>(
    candidates: &[&'a Participant],
    name: &str,
) -> Result<&'a Participant, ValidationFailure> {
    candidates
        .iter()
        .copied()
        .find(|p| p.name == name)
        .ok_or_else(|| ValidationFailure::Ineligible(name.to_owned()))
}

/// Validates a proposed speaking order, falling back to roster order.
///
/// Suspects missing from an otherwise valid proposal are appended in roster
/// order, so every suspect speaks exactly once.
#[must_use]
pub fn validate_turn_order(
    raw: Result<&str, ValidationFailure>,
    roster: &Roster,
) -> TurnOrderDecision {
    match check_turn_order(raw, roster) {
        Ok(decision) => decision,
        Err(failure) => {
            warn!(%failure, "turn order reply rejected, using roster order");
            fallback_turn_order(roster)
        }
    }
}

fn check_turn_order(
    raw: Result<&str, ValidationFailure>,
    roster: &Roster,
) -> Result<TurnOrderDecision, ValidationFailure> {
    let reply: TurnOrderReply = decode(raw)?;
    let announcement = reply.announcement.trim();
    if announcement.is_empty() {
        return Err(ValidationFailure::EmptyField("announcement"));
    }
    if reply.turn_order.is_empty() {
        return Err(ValidationFailure::EmptyField("turn_order"));
    }

    let suspects = roster.suspect_ids();
    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(suspects.len());
    for raw_id in reply.turn_order {
        let id = ParticipantId::new(raw_id);
        if !suspects.contains(&id) {
            return Err(ValidationFailure::Ineligible(id.to_string()));
        }
        if !seen.insert(id.clone()) {
            return Err(ValidationFailure::Duplicate(id.to_string()));
        }
        order.push(id);
    }
    order.extend(suspects.into_iter().filter(|id| !seen.contains(id)));

    Ok(TurnOrderDecision {
        order,
        announcement: announcement.to_owned(),
        origin: DecisionOrigin::Provider,
    })
}

/// Roster order with an announcement listing the speakers.
#[must_use]
pub fn fallback_turn_order(roster: &Roster) -> TurnOrderDecision {
    let names: Vec<&str> = roster.suspects().map(|p| p.name.as_str()).collect();
    TurnOrderDecision {
        order: roster.suspect_ids(),
        announcement: format!("Speaking order: {}", names.join(" -> ")),
        origin: DecisionOrigin::Fallback,
    }
}

/// Validates a vote reply from `voter`, falling back to a random distinct pair.
#[must_use]
pub fn validate_vote(
    raw: Result<&str, ValidationFailure>,
    roster: &Roster,
    voter: &Participant,
    rng: &mut dyn DeterministicRng,
) -> Vote {
    let candidates = roster.candidates_for(&voter.id);
    match check_vote(raw, &candidates, voter) {
        Ok(vote) => vote,
        Err(failure) => {
            warn!(voter = %voter.id, %failure, "vote reply rejected, using fallback vote");
            fallback_vote(&candidates, voter, rng)
        }
    }
}

fn check_vote(
    raw: Result<&str, ValidationFailure>,
    candidates: &[&Participant],
    voter: &Participant,
) -> Result<Vote, ValidationFailure> {
    let reply: VoteReply = decode(raw)?;
    let trust = resolve_name(candidates, reply.trust.trim())?;
    let suspect = resolve_name(candidates, reply.suspect.trim())?;
    if trust.id == suspect.id {
        return Err(ValidationFailure::SameTrustAndSuspect);
    }
    Ok(Vote {
        trust: trust.id.clone(),
        suspect: suspect.id.clone(),
        rationale: rationale_or_default(reply.rationale, &voter.name),
        origin: DecisionOrigin::Provider,
    })
}

fn fallback_vote(
    candidates: &[&Participant],
    voter: &Participant,
    rng: &mut dyn DeterministicRng,
) -> Vote {
    let len = candidates.len();
    let trust_index = pick_index(rng, len).unwrap_or(0);
    let mut suspect_index = pick_index(rng, len.saturating_sub(1)).unwrap_or(0);
    if suspect_index >= trust_index {
        suspect_index += 1;
    }
    let trust = candidates[trust_index];
    let suspect = candidates[suspect_index.min(len - 1)];
    Vote {
        trust: trust.id.clone(),
        suspect: suspect.id.clone(),
        rationale: format!(
            "{} trusts {} and has doubts about {}.",
            voter.name, trust.name, suspect.name
        ),
        origin: DecisionOrigin::Fallback,
    }
}

/// Validates an accusation reply, falling back to a random candidate.
#[must_use]
pub fn validate_accusation(
    raw: Result<&str, ValidationFailure>,
    roster: &Roster,
    accuser: &Participant,
    rng: &mut dyn DeterministicRng,
) -> Accusation {
    let candidates = roster.candidates_for(&accuser.id);
    let checked = decode::<AccusationReply>(raw).and_then(|reply| {
        let accused = resolve_name(&candidates, reply.accused.trim())?;
        Ok(Accusation {
            accused: accused.id.clone(),
            rationale: rationale_or_default(reply.rationale, &accuser.name),
            origin: DecisionOrigin::Provider,
        })
    });
    match checked {
        Ok(accusation) => accusation,
        Err(failure) => {
            warn!(accuser = %accuser.id, %failure, "accusation reply rejected, using fallback");
            let index = pick_index(rng, candidates.len()).unwrap_or(0);
            let accused = candidates[index];
            Accusation {
                accused: accused.id.clone(),
                rationale: format!("{} points at {}.", accuser.name, accused.name),
                origin: DecisionOrigin::Fallback,
            }
        }
    }
}
