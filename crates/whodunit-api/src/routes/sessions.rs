//! Routes for game sessions: inbound operations, snapshots and the live feed.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use whodunit_engine::application::command_handlers::SubmissionOutcome;
use whodunit_engine::application::query_handlers::SessionView;
use whodunit_engine::application::serializer::DriveReport;
use whodunit_engine::application::session::GameSession;
use whodunit_engine::domain::ledger::{MessageEntry, Viewer};
use whodunit_engine::domain::roster::ParticipantId;
use whodunit_engine::domain::stage::Stage;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string naming who is looking; omitted means the public view.
#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub viewer: Option<String>,
}

/// Request body naming the acting participant.
#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    pub participant_id: String,
}

/// Request body for POST /{id}/statements.
#[derive(Debug, Deserialize)]
pub struct StatementRequest {
    pub participant_id: String,
    pub text: String,
}

/// Request body for POST /{id}/votes.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub participant_id: String,
    pub trust_id: String,
    pub suspect_id: String,
    #[serde(default)]
    pub rationale: String,
}

/// Request body for POST /{id}/accusations.
#[derive(Debug, Deserialize)]
pub struct AccusationRequest {
    pub participant_id: String,
    pub accused_id: String,
    #[serde(default)]
    pub rationale: String,
}

/// Request body for POST /{id}/public-clues.
#[derive(Debug, Deserialize)]
pub struct PublishClueRequest {
    pub participant_id: String,
    pub clue: String,
}

/// Request body for POST /{id}/private-questions.
#[derive(Debug, Deserialize)]
pub struct PrivateQuestionRequest {
    pub participant_id: String,
    pub question: String,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub title: String,
    pub stage: Stage,
}

/// Response body for presence changes.
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub participant_id: ParticipantId,
    pub online: bool,
}

/// Response body for POST /{id}/private-questions.
#[derive(Debug, Serialize)]
pub struct PrivateAnswerResponse {
    pub answer: String,
}

fn viewer_for(session: &GameSession, query: &ViewerQuery) -> Result<Viewer, ApiError> {
    match query.viewer.as_deref() {
        None | Some("") => Ok(Viewer::Everyone),
        Some(raw) => {
            session.ensure_participant(raw)?;
            Ok(Viewer::Participant(ParticipantId::new(raw)))
        }
    }
}

/// Kicks off a background drive once a submission has been recorded.
fn advance_if_accepted(session: &std::sync::Arc<GameSession>, outcome: &SubmissionOutcome) {
    if outcome.is_accepted() {
        session.spawn_advance();
    }
}

/// POST /
#[instrument(skip(state))]
async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let session = state.create_session();
    info!(session_id = %session.id(), "session created");
    Json(CreateSessionResponse {
        session_id: session.id(),
        title: state.scenario.title().to_owned(),
        stage: session.stage(),
    })
}

/// POST /{id}/connect
///
/// Connecting the designated human starts the game; the drive runs in the
/// background and its progress arrives on the event feed.
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn connect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let session = state.session(id)?;
    session.ensure_participant(&request.participant_id)?;

    let participant = request.participant_id.clone();
    tokio::spawn(async move {
        if let Err(error) = session.connect(&participant).await {
            warn!(%error, "connect failed");
        }
    });

    Ok(Json(PresenceResponse {
        participant_id: ParticipantId::new(request.participant_id),
        online: true,
    }))
}

/// POST /{id}/disconnect
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let session = state.session(id)?;
    let outcome = session.disconnect(&request.participant_id).await?;
    Ok(Json(PresenceResponse {
        participant_id: ParticipantId::new(request.participant_id),
        online: outcome.online,
    }))
}

/// POST /{id}/statements
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn submit_statement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatementRequest>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let session = state.session(id)?;
    let outcome = session
        .submit_statement(&request.participant_id, &request.text)
        .await;
    advance_if_accepted(&session, &outcome);
    Ok(Json(outcome))
}

/// POST /{id}/votes
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn submit_vote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let session = state.session(id)?;
    let outcome = session
        .submit_vote(
            &request.participant_id,
            &request.trust_id,
            &request.suspect_id,
            &request.rationale,
        )
        .await;
    advance_if_accepted(&session, &outcome);
    Ok(Json(outcome))
}

/// POST /{id}/accusations
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn submit_accusation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AccusationRequest>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let session = state.session(id)?;
    let outcome = session
        .submit_accusation(
            &request.participant_id,
            &request.accused_id,
            &request.rationale,
        )
        .await;
    advance_if_accepted(&session, &outcome);
    Ok(Json(outcome))
}

/// POST /{id}/public-clues
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn publish_clue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishClueRequest>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let session = state.session(id)?;
    let outcome = session
        .publish_clue(&request.participant_id, &request.clue)
        .await?;
    Ok(Json(outcome))
}

/// POST /{id}/private-questions
#[instrument(skip(state, request), fields(session_id = %id, participant = %request.participant_id))]
async fn private_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PrivateQuestionRequest>,
) -> Result<Json<PrivateAnswerResponse>, ApiError> {
    let session = state.session(id)?;
    let answer = session
        .private_question(&request.participant_id, &request.question)
        .await?;
    Ok(Json(PrivateAnswerResponse { answer }))
}

/// POST /{id}/advance
///
/// Drives inline and reports what happened; coalesces into an active drive.
#[instrument(skip(state), fields(session_id = %id))]
async fn advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriveReport>, ApiError> {
    let session = state.session(id)?;
    Ok(Json(session.request_advance().await))
}

/// GET /{id}/state
async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.session(id)?;
    let viewer = viewer_for(&session, &query)?;
    Ok(Json(session.snapshot(&viewer)))
}

/// GET /{id}/history
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<Vec<MessageEntry>>, ApiError> {
    let session = state.session(id)?;
    let viewer = viewer_for(&session, &query)?;
    Ok(Json(session.history(&viewer)))
}

/// GET /{id}/events
///
/// Server-sent events carrying every engine event the viewer may see.
#[instrument(skip(state, query), fields(session_id = %id, viewer = ?query.viewer))]
async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ViewerQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = state.session(id)?;
    let viewer = viewer_for(&session, &query)?;
    info!("event feed opened");

    let stream = BroadcastStream::new(session.subscribe()).filter_map(move |item| match item {
        Ok(event) if event.audience.admits(&viewer) => {
            match Event::default()
                .event(event.kind.type_name())
                .json_data(&event)
            {
                Ok(sse) => Some(Ok(sse)),
                Err(error) => {
                    warn!(%error, "failed to encode event");
                    None
                }
            }
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "event feed lagged, events dropped");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Returns the router for game sessions.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}/connect", post(connect))
        .route("/{id}/disconnect", post(disconnect))
        .route("/{id}/statements", post(submit_statement))
        .route("/{id}/votes", post(submit_vote))
        .route("/{id}/accusations", post(submit_accusation))
        .route("/{id}/public-clues", post(publish_clue))
        .route("/{id}/private-questions", post(private_question))
        .route("/{id}/advance", post(advance))
        .route("/{id}/state", get(get_state))
        .route("/{id}/history", get(get_history))
        .route("/{id}/events", get(events))
}
