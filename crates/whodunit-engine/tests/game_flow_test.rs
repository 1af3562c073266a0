//! End-to-end tests driving a five-suspect game through every stage.

use std::time::Duration;

use tokio::sync::broadcast::Receiver;
use whodunit_engine::application::ports::{ProviderError, StatementPurpose};
use whodunit_engine::application::query_handlers::PendingView;
use whodunit_engine::application::serializer::{Advancement, DriveReport};
use whodunit_engine::application::session::GameSession;
use whodunit_engine::config::EngineConfig;
use whodunit_engine::domain::decisions::{ActionKind, DecisionOrigin, PendingAction};
use whodunit_engine::domain::events::{EngineEvent, EngineEventKind};
use whodunit_engine::domain::ledger::{MessageKind, Viewer};
use whodunit_engine::domain::roster::ParticipantId;
use whodunit_engine::domain::stage::Stage;
use whodunit_test_support::{
    AUTONOMOUS, CallKind, HUMAN, MockRng, ScriptedProvider, SequenceRng, Table, manor_setup, table,
    table_with,
};

fn id(raw: &str) -> ParticipantId {
    ParticipantId::new(raw)
}

fn drain(events: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn pending_for(session: &GameSession, kind: ActionKind) -> bool {
    session.snapshot(&Viewer::Everyone).pending
        == PendingView::AwaitingHuman(PendingAction::new(kind, id(HUMAN)))
}

/// Submits the human's statement and drives until the game settles again.
async fn speak(session: &GameSession, text: &str) -> DriveReport {
    assert!(session.submit_statement(HUMAN, text).await.is_accepted());
    session.request_advance().await
}

/// Plays from a fresh table up to the final accusation with the human pending.
async fn play_to_final_accusation(session: &GameSession) {
    session.connect(HUMAN).await.unwrap();
    speak(session, "I was in the garden all evening.").await;
    speak(session, "The boot print is mine, I went out to smoke.").await;
    assert!(
        session
            .submit_vote(HUMAN, "p2", "p3", "Xiu is too calm.")
            .await
            .is_accepted()
    );
    session.request_advance().await;
    speak(session, "The gloves settle it for me.").await;
    assert_eq!(session.stage(), Stage::FinalAccusation);
}

#[tokio::test]
async fn test_waiting_until_designated_human_connects() {
    // Arrange
    let Table { session, .. } = table(ScriptedProvider::new(), ScriptedProvider::new());

    // Act
    let report = session.request_advance().await;
    let other = session.connect("p2").await.unwrap();

    // Assert
    assert_eq!(
        report,
        DriveReport::Drove {
            advancements: vec![Advancement::Idle]
        }
    );
    assert!(other.drive.is_none());
    assert_eq!(session.stage(), Stage::Waiting);
}

#[tokio::test]
async fn test_malformed_turn_order_falls_back_to_roster_order() {
    // Arrange
    let narrator = ScriptedProvider::new()
        .with_statements(vec![Ok("Let the loudest speak first!".to_owned())]);
    let Table {
        session, suspects, ..
    } = table(narrator, ScriptedProvider::new());
    let mut events = session.subscribe();

    // Act
    let outcome = session.connect(HUMAN).await.unwrap();

    // Assert
    let report = outcome.drive.unwrap();
    assert_eq!(report.transitions(), vec![(Stage::Waiting, Stage::Alibi)]);
    assert_eq!(report.last(), Some(Advancement::Suspended));

    let view = session.snapshot(&Viewer::Everyone);
    assert_eq!(view.stage, Stage::Alibi);
    assert_eq!(
        view.turn_order,
        vec![id("p1"), id("p2"), id("p3"), id("p4"), id("p5")]
    );
    assert_eq!(view.current_actor, Some(id(HUMAN)));
    assert!(pending_for(&session, ActionKind::Statement));
    assert!(suspects.calls().is_empty());

    let history = session.history(&Viewer::Everyone);
    assert!(history.iter().any(|entry| entry.kind == MessageKind::Chat
        && entry.body == "Speaking order: Hong -> Zhang -> Xiu -> Lan -> Wei"));
    assert!(history.iter().any(|entry| entry.body == "It is now Hong's turn."));

    let published = drain(&mut events);
    assert!(published.iter().any(|event| matches!(
        &event.kind,
        EngineEventKind::TurnOrderSet { order, .. } if order.len() == 5
    )));
    assert!(published.iter().any(|event| matches!(
        &event.kind,
        EngineEventKind::PendingActionSet { action } if action.participant == id(HUMAN)
    )));
}

#[tokio::test]
async fn test_valid_turn_order_is_used_and_missing_suspects_appended() {
    // Arrange
    let narrator = ScriptedProvider::new().with_statements(vec![Ok(r#"Here you go:
        {"turn_order": ["p3", "p1"], "announcement": "Xiu opens, then Hong."}"#
        .to_owned())]);
    let Table {
        session, suspects, ..
    } = table(narrator, ScriptedProvider::new());

    // Act
    session.connect(HUMAN).await.unwrap();

    // Assert
    let view = session.snapshot(&Viewer::Everyone);
    assert_eq!(
        view.turn_order,
        vec![id("p3"), id("p1"), id("p2"), id("p4"), id("p5")]
    );
    assert_eq!(suspects.count(CallKind::Statement(StatementPurpose::Alibi)), 1);
    assert_eq!(view.current_actor, Some(id(HUMAN)));
    let history = session.history(&Viewer::Everyone);
    assert!(history.iter().any(|entry| entry.author_id == id("p3")
        && entry.kind == MessageKind::Chat));
}

#[tokio::test]
async fn test_human_statement_resumes_turns_through_investigation() {
    // Arrange
    let Table {
        session,
        suspects,
        memory,
        ..
    } = table(ScriptedProvider::new(), ScriptedProvider::new());
    let mut events = session.subscribe();
    session.connect(HUMAN).await.unwrap();

    // Act
    let report = speak(&session, "I was in the garden all evening.").await;

    // Assert
    assert_eq!(
        report.transitions(),
        vec![
            (Stage::Alibi, Stage::Investigation(1)),
            (Stage::Investigation(1), Stage::Discussion(1)),
        ]
    );
    assert_eq!(session.stage(), Stage::Discussion(1));
    assert!(pending_for(&session, ActionKind::Statement));
    assert_eq!(suspects.count(CallKind::Statement(StatementPurpose::Alibi)), 4);
    assert_eq!(
        suspects.count(CallKind::Statement(StatementPurpose::ClueReaction)),
        4
    );
    assert!(
        memory
            .lines()
            .contains(&"Hong: I was in the garden all evening.".to_owned())
    );

    // One pending statement per human turn (Alibi, then Discussion 1), and
    // none for the autonomous suspects.
    let pending: Vec<PendingAction> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event.kind {
            EngineEventKind::PendingActionSet { action } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(pending.len(), 2);
    for action in pending {
        assert_eq!(action.participant, id(HUMAN));
        assert_eq!(action.kind, ActionKind::Statement);
    }
}

#[tokio::test]
async fn test_every_turn_order_contains_each_suspect_once() {
    // Arrange
    let narrator = ScriptedProvider::new().with_statements(vec![
        Ok(r#"{"turn_order": ["p2", "p2", "p5", "ghost", "dm"], "announcement": "Go."}"#
            .to_owned()),
        Ok(r#"{"turn_order": ["Wei", "p4"], "announcement": "Wei first."}"#.to_owned()),
    ]);
    let Table { session, .. } = table(narrator, ScriptedProvider::new());
    let mut events = session.subscribe();

    // Act
    session.connect(HUMAN).await.unwrap();
    speak(&session, "I was in the garden.").await;

    // Assert
    let orders: Vec<Vec<ParticipantId>> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event.kind {
            EngineEventKind::TurnOrderSet { order, .. } => Some(order),
            _ => None,
        })
        .collect();
    assert_eq!(orders.len(), 2);
    for order in orders {
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![id("p1"), id("p2"), id("p3"), id("p4"), id("p5")]);
    }
}

#[tokio::test]
async fn test_voting_waits_for_every_suspect() {
    // Arrange
    let suspects = ScriptedProvider::new().with_votes(vec![
        Ok("I trust nobody.".to_owned()),
        Ok(r#"{"trust": "Hong", "suspect": "Hong", "rationale": "?"}"#.to_owned()),
    ]);
    let Table { session, .. } = table(ScriptedProvider::new(), suspects);
    session.connect(HUMAN).await.unwrap();
    speak(&session, "I was in the garden.").await;

    // Act
    let report = speak(&session, "The boot print is mine.").await;

    // Assert
    assert_eq!(report.last(), Some(Advancement::Suspended));
    assert_eq!(session.stage(), Stage::Voting(1));
    assert!(pending_for(&session, ActionKind::Vote));
    let view = session.snapshot(&Viewer::Everyone);
    assert_eq!(view.votes.len(), 4);
    assert!(!view.votes.contains_key(&id(HUMAN)));
    for vote in view.votes.values() {
        assert_ne!(vote.trust, vote.suspect);
    }
    assert_eq!(view.votes[&id("p2")].origin, DecisionOrigin::Fallback);
    assert_eq!(view.votes[&id("p3")].origin, DecisionOrigin::Fallback);
    assert_eq!(view.votes[&id("p4")].origin, DecisionOrigin::Provider);
}

#[tokio::test]
async fn test_autonomous_reasoning_is_spoken_and_remembered() {
    // Arrange
    let suspects = ScriptedProvider::new()
        .with_votes(vec![Ok(
            r#"{"trust": "Hong", "suspect": "Lan", "rationale": "Lan lied about the tea."}"#
                .to_owned(),
        )])
        .with_accusations(vec![Ok(
            r#"{"accused": "Xiu", "rationale": "Xiu's gloves were still damp."}"#.to_owned(),
        )]);
    let Table {
        session, memory, ..
    } = table(ScriptedProvider::new(), suspects);

    // Act
    play_to_final_accusation(&session).await;
    assert!(
        session
            .submit_accusation(HUMAN, "p4", "Lan's story changed twice.")
            .await
            .is_accepted()
    );
    session.request_advance().await;

    // Assert
    let zhang: Vec<String> = session
        .history(&Viewer::Everyone)
        .into_iter()
        .filter(|entry| entry.author_id == id("p2") && entry.kind == MessageKind::Chat)
        .map(|entry| entry.body)
        .collect();
    assert!(zhang.contains(&"Lan lied about the tea.".to_owned()));
    assert!(zhang.contains(&"Xiu's gloves were still damp.".to_owned()));
    let remembered = memory.lines();
    assert!(remembered.contains(&"Zhang: Lan lied about the tea.".to_owned()));
    assert!(remembered.contains(&"Zhang: Xiu's gloves were still damp.".to_owned()));
    let view = session.snapshot(&Viewer::Everyone);
    assert_eq!(view.votes[&id("p2")].origin, DecisionOrigin::Provider);
    assert_eq!(view.accusations[&id("p2")].accused, id("p3"));
}

#[tokio::test]
async fn test_fallback_vote_pair_comes_from_session_rng() {
    // Arrange
    let suspects = ScriptedProvider::new().with_votes(vec![Ok("No comment.".to_owned())]);
    let Table { session, .. } = table_with(
        manor_setup(),
        ScriptedProvider::new(),
        suspects,
        EngineConfig::immediate(),
        Box::new(SequenceRng::new(vec![2, 0])),
    );
    session.connect(HUMAN).await.unwrap();
    speak(&session, "I was in the garden.").await;

    // Act
    speak(&session, "The boot print is mine.").await;

    // Assert
    let vote = &session.snapshot(&Viewer::Everyone).votes[&id("p2")];
    assert_eq!(vote.origin, DecisionOrigin::Fallback);
    assert_eq!(vote.trust, id("p4"));
    assert_eq!(vote.suspect, id(HUMAN));
    assert_eq!(vote.rationale, "Zhang trusts Lan and has doubts about Hong.");
}

#[tokio::test]
async fn test_human_vote_completes_round_and_reaches_discussion_two() {
    // Arrange
    let Table { session, .. } = table(ScriptedProvider::new(), ScriptedProvider::new());
    session.connect(HUMAN).await.unwrap();
    speak(&session, "I was in the garden.").await;
    speak(&session, "The boot print is mine.").await;

    // Act
    let outcome = session.submit_vote(HUMAN, "p2", "p3", "Xiu is too calm.").await;
    let report = session.request_advance().await;

    // Assert
    assert!(outcome.is_accepted());
    assert_eq!(
        report.transitions(),
        vec![
            (Stage::Voting(1), Stage::Investigation(2)),
            (Stage::Investigation(2), Stage::Discussion(2)),
        ]
    );
    let history = session.history(&Viewer::Everyone);
    assert!(history.iter().any(|entry| entry.body.starts_with("Voting results: ")
        && entry.body.contains("Hong trusts Zhang and suspects Xiu")));
    let view = session.snapshot(&Viewer::Participant(id(HUMAN)));
    assert_eq!(
        view.your_clues,
        vec![
            "A muddy boot print by the window.".to_owned(),
            "The clock was stopped at 9:40.".to_owned(),
        ]
    );
}

#[tokio::test]
async fn test_full_game_ends_with_two_reveals_then_idle() {
    // Arrange
    let Table {
        session, narrator, ..
    } = table(ScriptedProvider::new(), ScriptedProvider::new());
    play_to_final_accusation(&session).await;
    assert!(pending_for(&session, ActionKind::Accusation));
    let mut events = session.subscribe();

    // Act
    let outcome = session
        .submit_accusation(HUMAN, "p3", "The tea was poisoned.")
        .await;
    let report = session.request_advance().await;
    let after = session.request_advance().await;

    // Assert
    assert!(outcome.is_accepted());
    assert_eq!(
        report.transitions(),
        vec![(Stage::FinalAccusation, Stage::Resolved)]
    );
    assert_eq!(report.last(), Some(Advancement::Idle));
    assert_eq!(
        after,
        DriveReport::Drove {
            advancements: vec![Advancement::Idle]
        }
    );
    let reveals: Vec<_> = session
        .history(&Viewer::Everyone)
        .into_iter()
        .filter(|entry| entry.kind == MessageKind::NarratorReveal)
        .collect();
    assert_eq!(reveals.len(), 2);
    assert_eq!(
        narrator.count(CallKind::Statement(StatementPurpose::RevealTruth)),
        1
    );
    assert_eq!(
        narrator.count(CallKind::Statement(StatementPurpose::RevealScoring)),
        1
    );
    assert_eq!(session.snapshot(&Viewer::Everyone).accusations.len(), 5);

    // The game resolves only after both reveals are in the ledger.
    let published = drain(&mut events);
    let resolved_at = published
        .iter()
        .position(|event| {
            matches!(
                event.kind,
                EngineEventKind::StageChanged {
                    to: Stage::Resolved,
                    ..
                }
            )
        })
        .unwrap();
    let reveals_at: Vec<usize> = published
        .iter()
        .enumerate()
        .filter(|(_, event)| {
            matches!(
                &event.kind,
                EngineEventKind::MessageAppended { entry } if entry.kind == MessageKind::NarratorReveal
            )
        })
        .map(|(index, _)| index)
        .collect();
    assert_eq!(reveals_at.len(), 2);
    assert!(reveals_at.iter().all(|&index| index < resolved_at));
}

#[tokio::test]
async fn test_failed_reveals_use_templated_text() {
    // Arrange
    let narrator = ScriptedProvider::new().with_statements(vec![
        Err(ProviderError::Failed("turn order".to_owned())),
        Err(ProviderError::Failed("turn order".to_owned())),
        Err(ProviderError::Failed("turn order".to_owned())),
        Err(ProviderError::Unavailable("offline".to_owned())),
        Ok("   ".to_owned()),
    ]);
    let Table { session, .. } = table(narrator, ScriptedProvider::new());
    play_to_final_accusation(&session).await;

    // Act
    session.submit_accusation(HUMAN, "p3", "").await;
    session.request_advance().await;

    // Assert
    let reveals: Vec<String> = session
        .history(&Viewer::Everyone)
        .into_iter()
        .filter(|entry| entry.kind == MessageKind::NarratorReveal)
        .map(|entry| entry.body)
        .collect();
    assert_eq!(
        reveals,
        vec![
            "The truth is out: Xiu is the culprit.".to_owned(),
            "Correct accusations: Hong.".to_owned(),
        ]
    );
}

#[tokio::test]
async fn test_stage_changes_only_move_forward() {
    // Arrange
    let Table { session, .. } = table(ScriptedProvider::new(), ScriptedProvider::new());
    let mut events = session.subscribe();

    // Act
    session.connect(HUMAN).await.unwrap();
    let mut stages = Vec::new();
    for text in ["Alibi.", "Round one."] {
        stages.extend(drain(&mut events));
        speak(&session, text).await;
    }
    stages.extend(drain(&mut events));

    // Assert
    let changes: Vec<(Stage, Stage)> = stages
        .into_iter()
        .filter_map(|event| match event.kind {
            EngineEventKind::StageChanged { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(changes.first(), Some(&(Stage::Waiting, Stage::Alibi)));
    assert_eq!(changes.last(), Some(&(Stage::Discussion(1), Stage::Voting(1))));
    for (from, to) in &changes {
        assert!(to.ordinal() > from.ordinal());
    }
    for pair in changes.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_coalesce_into_one_transition() {
    // Arrange
    let narrator = ScriptedProvider::new().with_delay(Duration::from_millis(50));
    let Table {
        session, narrator, ..
    } = table(narrator, ScriptedProvider::new());
    let mut events = session.subscribe();

    // Act
    let (connected, second) = tokio::join!(session.connect(HUMAN), session.request_advance());

    // Assert
    assert_eq!(second, DriveReport::Coalesced);
    let report = connected.unwrap().drive.unwrap();
    assert_eq!(report.transitions(), vec![(Stage::Waiting, Stage::Alibi)]);
    assert_eq!(
        narrator.count(CallKind::Statement(StatementPurpose::TurnOrder)),
        1
    );
    let stage_changes = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event.kind, EngineEventKind::StageChanged { .. }))
        .count();
    assert_eq!(stage_changes, 1);
    assert!(!session.is_driving());
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out_into_placeholder() {
    // Arrange
    let config = EngineConfig {
        decision_timeout: Duration::from_secs(1),
        ..EngineConfig::immediate()
    };
    let suspects = ScriptedProvider::new().with_delay(Duration::from_secs(5));
    let Table { session, .. } = table_with(
        manor_setup(),
        ScriptedProvider::new(),
        suspects,
        config,
        Box::new(MockRng),
    );
    session.connect(HUMAN).await.unwrap();

    // Act
    speak(&session, "I was in the garden.").await;

    // Assert
    let history = session.history(&Viewer::Everyone);
    for name in ["Zhang", "Xiu", "Lan", "Wei"] {
        let placeholder = format!("({name} hesitates and says nothing.)");
        assert!(history.iter().any(|entry| entry.body == placeholder));
    }
}

#[tokio::test]
async fn test_private_clues_stay_with_their_recipient() {
    // Arrange
    let Table { session, .. } = table(ScriptedProvider::new(), ScriptedProvider::new());
    let mut events = session.subscribe();
    session.connect(HUMAN).await.unwrap();

    // Act
    speak(&session, "I was in the garden.").await;

    // Assert
    let public = session.history(&Viewer::Everyone);
    assert!(public.iter().all(|entry| entry.addressee.is_none()));
    assert!(public.iter().all(|entry| !entry.body.contains("muddy boot print")));

    let mine = session.history(&Viewer::Participant(id(HUMAN)));
    assert!(mine.iter().any(|entry| entry.kind == MessageKind::Private
        && entry.body == "Your clues for round 1:\n- A muddy boot print by the window."));
    assert!(mine.iter().all(|entry| !entry.body.contains("torn page")));

    let wei = session.history(&Viewer::Participant(id("p5")));
    assert!(wei.iter().any(|entry| entry.body.contains("A cufflink under the desk.")));

    let viewer = Viewer::Participant(id(HUMAN));
    for event in drain(&mut events) {
        if let EngineEventKind::CluesDelivered { participant, .. } = &event.kind {
            assert_eq!(event.audience.admits(&viewer), participant == &id(HUMAN));
        }
    }
    for autonomous in AUTONOMOUS {
        assert_eq!(
            session
                .snapshot(&Viewer::Participant(id(autonomous)))
                .your_clues
                .len(),
            1
        );
    }
}
