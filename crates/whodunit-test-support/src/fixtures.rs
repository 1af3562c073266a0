//! Scenario fixtures — a five-suspect table wired to scripted providers.

use std::sync::Arc;

use uuid::Uuid;
use whodunit_core::rng::DeterministicRng;
use whodunit_engine::application::gateway::DecisionGateway;
use whodunit_engine::application::session::{GameSession, SessionParts};
use whodunit_engine::config::EngineConfig;
use whodunit_engine::domain::roster::{Participant, ParticipantId, ParticipantKind, Roster};
use whodunit_engine::domain::setup::GameSetup;

use crate::clock::FixedClock;
use crate::memory::RecordingMemory;
use crate::provider::ScriptedProvider;
use crate::rng::MockRng;

/// Id of the fixture narrator.
pub const NARRATOR: &str = "dm";
/// Id of the fixture's designated human.
pub const HUMAN: &str = "p1";
/// Ids of the fixture's autonomous suspects, in roster order.
pub const AUTONOMOUS: [&str; 4] = ["p2", "p3", "p4", "p5"];

/// Narrator, one human (`p1`) and four autonomous suspects.
///
/// # Panics
///
/// Never; the fixture roster is valid.
#[must_use]
pub fn five_suspect_roster() -> Roster {
    Roster::new(
        vec![
            Participant::narrator(NARRATOR, "Narrator"),
            Participant::suspect(HUMAN, "Hong", ParticipantKind::Human),
            Participant::suspect("p2", "Zhang", ParticipantKind::Autonomous),
            Participant::suspect("p3", "Xiu", ParticipantKind::Autonomous),
            Participant::suspect("p4", "Lan", ParticipantKind::Autonomous),
            Participant::suspect("p5", "Wei", ParticipantKind::Autonomous).with_clue_key("w"),
        ],
        ParticipantId::new(HUMAN),
    )
    .unwrap()
}

/// The fixture game: round 1 clues for everyone, round 2 clues for `p1` and
/// `p2` only, `p3` as the culprit.
///
/// # Panics
///
/// Never; the fixture clue rounds are valid.
#[must_use]
pub fn manor_setup() -> GameSetup {
    let mut setup = GameSetup::new("Murder at Willow Manor", five_suspect_roster());
    setup.synopsis = "The host was found in the locked study.".to_owned();
    for (key, clue) in [
        ("p1", "A muddy boot print by the window."),
        ("p2", "A torn page from the guest book."),
        ("p3", "A cold cup of tea in the library."),
        ("p4", "The study key is missing from its hook."),
        ("w", "A cufflink under the desk."),
    ] {
        setup.clues.insert(1, key, vec![clue.to_owned()]).unwrap();
    }
    setup
        .clues
        .insert(2, "p1", vec!["The clock was stopped at 9:40.".to_owned()])
        .unwrap();
    setup
        .clues
        .insert(2, "p2", vec!["Xiu's gloves are damp.".to_owned()])
        .unwrap();
    setup.dossiers.insert(
        ParticipantId::new(NARRATOR),
        "Xiu poisoned the host's tea.".to_owned(),
    );
    setup.dossiers.insert(
        ParticipantId::new("p3"),
        "You are the culprit. Deny everything.".to_owned(),
    );
    setup.culprit = Some(ParticipantId::new("p3"));
    setup
}

/// A session plus handles to its doubles.
pub struct Table {
    pub session: Arc<GameSession>,
    pub narrator: Arc<ScriptedProvider>,
    pub suspects: Arc<ScriptedProvider>,
    pub memory: Arc<RecordingMemory>,
}

/// The fixture game with no pauses and `MockRng`.
#[must_use]
pub fn table(narrator: ScriptedProvider, suspects: ScriptedProvider) -> Table {
    table_with(
        manor_setup(),
        narrator,
        suspects,
        EngineConfig::immediate(),
        Box::new(MockRng),
    )
}

/// A session for `setup`; the narrator gets `narrator`, every autonomous
/// suspect shares `suspects`.
#[must_use]
pub fn table_with(
    setup: GameSetup,
    narrator: ScriptedProvider,
    suspects: ScriptedProvider,
    config: EngineConfig,
    rng: Box<dyn DeterministicRng>,
) -> Table {
    let narrator = Arc::new(narrator);
    let suspects = Arc::new(suspects);
    let memory = Arc::new(RecordingMemory::new());

    let mut gateway = DecisionGateway::new(config.decision_timeout)
        .with_provider(setup.roster.narrator().id.clone(), narrator.clone());
    for suspect in setup.roster.suspects() {
        if suspect.kind == ParticipantKind::Autonomous {
            gateway = gateway.with_provider(suspect.id.clone(), suspects.clone());
        }
    }

    let session = GameSession::new(
        Uuid::new_v4(),
        setup,
        SessionParts {
            gateway,
            memory: memory.clone(),
            clock: Arc::new(FixedClock::fixture()),
            rng,
            config,
        },
    );
    Table {
        session: Arc::new(session),
        narrator,
        suspects,
        memory,
    }
}
