//! Offline decision providers.
//!
//! [`TableTalkProvider`] plays an autonomous seat without any remote model:
//! statements come from templates seeded with the participant's clues, votes
//! and accusations follow who the clues and table talk mention most, and ties
//! are broken with a seeded generator. Replies use the same structured shapes
//! a remote model is asked for, so they go through the engine's validator
//! unchanged.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use whodunit_core::rng::{SeededRng, pick_index};
use whodunit_engine::application::ports::{
    Candidate, DecisionContext, DecisionProvider, ProviderError, StatementPurpose,
    StatementRequest,
};
use whodunit_engine::domain::roster::Participant;

const ALIBIS: [&str; 4] = [
    "I was in the drawing room most of the evening, ask anyone who passed through.",
    "I stepped out to the terrace for air and came straight back when I heard the commotion.",
    "I spent the evening in the library. The fire was the only company I had.",
    "I was helping in the kitchen until well after nine.",
];

const DISCUSSION: [&str; 3] = [
    "Something about {clue} does not sit right with me.",
    "We keep circling the obvious. What explains {clue}?",
    "I have been thinking about {clue}. Someone here knows more than they say.",
];

const REACTIONS: [&str; 3] = [
    "Interesting. {clue} changes things.",
    "I did not expect this: {clue}",
    "Hm. {clue} I will keep that in mind.",
];

const ANSWERS: [&str; 3] = [
    "Retrace the evening by the clock. The timings do not all agree.",
    "Look at who had a reason to be near the study, not just the chance.",
    "Not everyone who hides something is hiding a murder.",
];

/// Builds the provider for one autonomous seat.
pub trait ProviderFactory: Send + Sync {
    fn provider_for(&self, participant: &Participant) -> Arc<dyn DecisionProvider>;
}

/// Hands every autonomous seat its own [`TableTalkProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProviders {
    seed: Option<u64>,
}

impl OfflineProviders {
    /// `Some(seed)` makes every seat reproducible; `None` uses OS entropy.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl ProviderFactory for OfflineProviders {
    fn provider_for(&self, participant: &Participant) -> Arc<dyn DecisionProvider> {
        let seed = self.seed.map(|seed| {
            participant
                .id
                .as_str()
                .bytes()
                .fold(seed, |acc, byte| acc.wrapping_mul(31).wrapping_add(u64::from(byte)))
        });
        Arc::new(TableTalkProvider::new(seed))
    }
}

/// A heuristic, fully offline decision provider.
#[derive(Debug)]
pub struct TableTalkProvider {
    rng: Mutex<SeededRng>,
}

impl TableTalkProvider {
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(SeededRng::from_entropy, SeededRng::from_seed);
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        pick_index(&mut *rng, items.len()).map(|index| &items[index])
    }

    fn pick_template(&self, templates: &[&str], clue: &str) -> String {
        self.pick(templates)
            .map_or_else(String::new, |template| template.replace("{clue}", clue))
    }

    /// Candidates ranked by how often the participant's clues and the recent
    /// table talk mention them, most mentioned first; ties keep roster order.
    fn ranked<'a>(context: &DecisionContext, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
        let corpus: Vec<&str> = context
            .clues
            .iter()
            .chain(context.memory.iter())
            .map(String::as_str)
            .collect();
        let mut scored: Vec<(usize, &Candidate)> = candidates
            .iter()
            .map(|candidate| {
                let mentions = corpus
                    .iter()
                    .map(|text| text.matches(candidate.name.as_str()).count())
                    .sum();
                (mentions, candidate)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, candidate)| candidate).collect()
    }

    fn turn_order(&self, context: &DecisionContext) -> String {
        let mut ids: Vec<String> = context
            .note
            .as_deref()
            .and_then(|note| note.split_once("Suspects (id: name): "))
            .map(|(_, list)| {
                list.split(", ")
                    .filter_map(|pair| pair.split_once(": ").map(|(id, _)| id.to_owned()))
                    .collect()
            })
            .unwrap_or_default();
        let mut order = Vec::with_capacity(ids.len());
        while !ids.is_empty() {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let index = pick_index(&mut *rng, ids.len()).unwrap_or(0);
            order.push(ids.remove(index));
        }
        serde_json::json!({
            "turn_order": order,
            "announcement": "Let us hear from everyone in turn.",
        })
        .to_string()
    }
}

#[async_trait]
impl DecisionProvider for TableTalkProvider {
    async fn produce_statement(
        &self,
        request: &StatementRequest,
        context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        let clue = self
            .pick(&context.clues)
            .map_or("what we heard tonight", String::as_str);
        let text = match request.purpose {
            StatementPurpose::Alibi => self.pick_template(&ALIBIS, clue),
            StatementPurpose::Discussion => self.pick_template(&DISCUSSION, clue),
            StatementPurpose::ClueReaction => self.pick_template(&REACTIONS, clue),
            StatementPurpose::TurnOrder => self.turn_order(context),
            StatementPurpose::RevealTruth => {
                if context.dossier.trim().is_empty() {
                    return Err(ProviderError::Unavailable("no case file".to_owned()));
                }
                format!("Here is what really happened. {}", context.dossier.trim())
            }
            StatementPurpose::RevealScoring => {
                let summary = context.note.as_deref().unwrap_or_default();
                format!("{summary} Thank you all for playing your parts.")
            }
        };
        Ok(text)
    }

    async fn produce_vote(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError> {
        let ranked = Self::ranked(context, candidates);
        let (Some(suspect), Some(trust)) = (ranked.first(), ranked.last()) else {
            return Err(ProviderError::Failed("no candidates".to_owned()));
        };
        if suspect.id == trust.id {
            return Err(ProviderError::Failed("need two candidates".to_owned()));
        }
        Ok(serde_json::json!({
            "trust": trust.name,
            "suspect": suspect.name,
            "rationale": format!("{} keeps coming up, {} does not.", suspect.name, trust.name),
        })
        .to_string())
    }

    async fn produce_accusation(
        &self,
        context: &DecisionContext,
        candidates: &[Candidate],
    ) -> Result<String, ProviderError> {
        let ranked = Self::ranked(context, candidates);
        let accused = match ranked.first() {
            Some(top) if !context.clues.is_empty() || !context.memory.is_empty() => *top,
            _ => self
                .pick(candidates)
                .ok_or_else(|| ProviderError::Failed("no candidates".to_owned()))?,
        };
        Ok(serde_json::json!({
            "accused": accused.name,
            "rationale": format!("Every thread I pulled led back to {}.", accused.name),
        })
        .to_string())
    }

    async fn answer_private(
        &self,
        _question: &str,
        _context: &DecisionContext,
    ) -> Result<String, ProviderError> {
        self.pick(&ANSWERS)
            .map(|answer| (*answer).to_owned())
            .ok_or_else(|| ProviderError::Failed("nothing to say".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use whodunit_engine::domain::roster::{ParticipantId, ParticipantKind};

    use super::*;

    fn candidates() -> Vec<Candidate> {
        ["Hong", "Xiu", "Lan"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| Candidate {
                id: ParticipantId::new(format!("p{}", i + 1)),
                name: name.to_owned(),
            })
            .collect()
    }

    fn context_with(clues: &[&str]) -> DecisionContext {
        DecisionContext {
            participant_id: ParticipantId::new("p2"),
            participant_name: "Zhang".to_owned(),
            clues: clues.iter().map(|c| (*c).to_owned()).collect(),
            ..DecisionContext::default()
        }
    }

    #[tokio::test]
    async fn test_vote_suspects_most_mentioned_and_trusts_least() {
        // Arrange
        let provider = TableTalkProvider::new(Some(1));
        let context = context_with(&["Xiu's gloves are damp.", "Xiu left early.", "Lan saw Xiu."]);

        // Act
        let reply = provider.produce_vote(&context, &candidates()).await.unwrap();

        // Assert
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["suspect"], "Xiu");
        assert_eq!(json["trust"], "Hong");
    }

    #[tokio::test]
    async fn test_accusation_names_most_mentioned_candidate() {
        // Arrange
        let provider = TableTalkProvider::new(Some(1));
        let context = context_with(&["Lan had the key.", "Lan lied about the time."]);

        // Act
        let reply = provider
            .produce_accusation(&context, &candidates())
            .await
            .unwrap();

        // Assert
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["accused"], "Lan");
    }

    #[tokio::test]
    async fn test_turn_order_lists_every_suspect_from_note() {
        // Arrange
        let provider = TableTalkProvider::new(Some(9));
        let context = DecisionContext {
            note: Some(
                "Order the suspects for Alibi statements. Suspects (id: name): p1: Hong, p2: Zhang, p3: Xiu"
                    .to_owned(),
            ),
            ..DecisionContext::default()
        };

        // Act
        let reply = provider
            .produce_statement(&StatementRequest::new(StatementPurpose::TurnOrder), &context)
            .await
            .unwrap();

        // Assert
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();
        let mut order: Vec<String> = json["turn_order"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_owned())
            .collect();
        order.sort();
        assert_eq!(order, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_truth_reveal_without_case_file_is_unavailable() {
        // Arrange
        let provider = TableTalkProvider::new(Some(3));

        // Act
        let reply = provider
            .produce_statement(
                &StatementRequest::new(StatementPurpose::RevealTruth),
                &DecisionContext::default(),
            )
            .await;

        // Assert
        assert!(matches!(reply, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_seeded_factory_is_reproducible() {
        // Arrange
        let factory = OfflineProviders::new(Some(42));
        let seat = Participant::suspect("p2", "Zhang", ParticipantKind::Autonomous);
        let context = context_with(&["A cold cup of tea."]);
        let request = StatementRequest::new(StatementPurpose::Alibi);

        // Act
        let first = factory
            .provider_for(&seat)
            .produce_statement(&request, &context)
            .await
            .unwrap();
        let second = factory
            .provider_for(&seat)
            .produce_statement(&request, &context)
            .await
            .unwrap();

        // Assert
        assert_eq!(first, second);
    }
}
