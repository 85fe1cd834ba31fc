//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::services::WorksheetRequest;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use lingua_core::domain::{
    Conversation, ConversationSummary, Evaluation, Exercise, Lesson, LessonSummary, Turn,
    VocabItem, Worksheet,
};
use lingua_core::ports::{Page, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_conversation_handler,
        submit_message_handler,
        close_conversation_handler,
        get_transcript_handler,
        create_worksheet_handler,
        preview_worksheet_handler,
        get_worksheet_handler,
        evaluate_answer_handler,
        list_lessons_handler,
        list_conversations_handler,
    ),
    components(
        schemas(
            StartConversationRequest,
            ConversationResponse,
            SubmitMessageRequest,
            TurnReplyResponse,
            TurnResponse,
            TranscriptResponse,
            WorksheetRequest,
            CreateWorksheetResponse,
            ExerciseResponse,
            LessonDetailResponse,
            EvaluateRequest,
            EvaluationResponse,
            LessonSummaryResponse,
            LessonPageResponse,
            ConversationSummaryResponse,
            ConversationPageResponse,
        )
    ),
    tags(
        (name = "Lingua Tutor API", description = "API endpoints for worksheet generation and conversation practice.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a port failure onto an HTTP response tuple. Unexpected errors are
/// logged in full and surfaced with a generic message.
fn port_error_response(context: &str, error: PortError) -> (StatusCode, String) {
    match error {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::ConversationClosed(id) => (
            StatusCode::CONFLICT,
            format!("Conversation {} is closed and no longer accepts turns", id),
        ),
        PortError::UpstreamGeneration(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Generation failed: {}", msg),
        ),
        PortError::MalformedGeneration(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Generated content was malformed: {}", msg),
        ),
        PortError::Unexpected(msg) => {
            error!("Unexpected error while trying to {}: {}", context, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", context),
            )
        }
    }
}

//=========================================================================================
// API Payload and Response Structs
//=========================================================================================

/// The request payload to start a new conversation session.
#[derive(Deserialize, ToSchema)]
pub struct StartConversationRequest {
    /// The learner starting the conversation; a guest learner is created
    /// when omitted.
    pub learner_id: Option<Uuid>,
    /// ISO language code of the target language.
    pub target_language: String,
    /// Optional scenario the tutor should stay within.
    pub scenario_context: Option<String>,
}

/// A conversation session.
#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub target_language: String,
    pub scenario_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            learner_id: c.learner_id,
            target_language: c.target_language,
            scenario_context: c.scenario_context,
            created_at: c.created_at,
            ended_at: c.ended_at,
        }
    }
}

/// The request payload for submitting one user message.
#[derive(Deserialize, ToSchema)]
pub struct SubmitMessageRequest {
    pub text: String,
}

/// The tutor's reply to a submitted message.
#[derive(Serialize, ToSchema)]
pub struct TurnReplyResponse {
    pub reply: String,
    /// Set when the reply carries an inline correction of the learner's
    /// message.
    pub correction: Option<String>,
}

/// One turn of a conversation transcript.
#[derive(Serialize, ToSchema)]
pub struct TurnResponse {
    pub id: Uuid,
    pub role: String,
    pub text: String,
    pub corrected_text: Option<String>,
    pub turn_index: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Turn> for TurnResponse {
    fn from(t: Turn) -> Self {
        Self {
            id: t.id,
            role: t.role.as_str().to_string(),
            text: t.text,
            corrected_text: t.corrected_text,
            turn_index: t.turn_index,
            created_at: t.created_at,
        }
    }
}

/// A conversation together with its full ordered transcript.
#[derive(Serialize, ToSchema)]
pub struct TranscriptResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub turns: Vec<TurnResponse>,
}

/// The response payload after generating and persisting a worksheet.
#[derive(Serialize, ToSchema)]
pub struct CreateWorksheetResponse {
    pub lesson_id: Uuid,
    pub version: i32,
    /// The full generated worksheet document.
    #[schema(value_type = Object)]
    pub worksheet: Worksheet,
    /// Persisted exercise IDs in worksheet order, for later evaluation calls.
    pub exercise_ids: Vec<Uuid>,
}

/// An exercise as served to learners. The correct answer is withheld;
/// grading happens server-side via the evaluate endpoint.
#[derive(Serialize, ToSchema)]
pub struct ExerciseResponse {
    pub id: Uuid,
    pub kind: String,
    pub question: String,
    pub hint: Option<String>,
    pub order_index: i32,
}

impl From<Exercise> for ExerciseResponse {
    fn from(e: Exercise) -> Self {
        Self {
            id: e.id,
            kind: e.kind.as_str().to_string(),
            question: e.question,
            hint: e.hint,
            order_index: e.order_index,
        }
    }
}

/// A stored lesson as served to learners: the study material from the
/// worksheet document plus answer-free exercises.
#[derive(Serialize, ToSchema)]
pub struct LessonDetailResponse {
    pub id: Uuid,
    pub target_language: String,
    pub scenario: String,
    pub grammar_focus: Option<String>,
    pub difficulty: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub scenario_summary: String,
    #[schema(value_type = Vec<Object>)]
    pub vocabulary: Vec<VocabItem>,
    pub explanations: String,
    pub roleplay_prompts: Vec<String>,
    pub exercises: Vec<ExerciseResponse>,
}

impl LessonDetailResponse {
    fn new(lesson: Lesson, exercises: Vec<Exercise>) -> Self {
        let Worksheet {
            scenario_summary,
            vocabulary,
            explanations,
            roleplay_prompts,
            ..
        } = lesson.worksheet;
        Self {
            id: lesson.id,
            target_language: lesson.target_language,
            scenario: lesson.scenario,
            grammar_focus: lesson.grammar_focus,
            difficulty: lesson.difficulty,
            version: lesson.version,
            created_at: lesson.created_at,
            scenario_summary,
            vocabulary,
            explanations,
            roleplay_prompts,
            exercises: exercises.into_iter().map(ExerciseResponse::from).collect(),
        }
    }
}

/// The request payload for grading a learner's answer.
#[derive(Deserialize, ToSchema)]
pub struct EvaluateRequest {
    pub exercise_id: Uuid,
    /// The learner submitting the answer; a guest learner is created when
    /// omitted.
    pub learner_id: Option<Uuid>,
    pub answer: String,
}

/// The grading verdict for a submitted answer.
#[derive(Serialize, ToSchema)]
pub struct EvaluationResponse {
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub correct_answer: String,
}

impl From<Evaluation> for EvaluationResponse {
    fn from(e: Evaluation) -> Self {
        Self {
            is_correct: e.is_correct,
            score: e.score,
            feedback: e.feedback,
            correct_answer: e.correct_answer,
        }
    }
}

/// Query parameters shared by the paginated listing endpoints.
#[derive(Deserialize, IntoParams)]
pub struct ListQuery {
    /// Restrict the listing to one learner.
    pub learner_id: Option<Uuid>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, clamped to [1, 100].
    pub page_size: Option<u32>,
}

/// A lesson row in a paginated listing.
#[derive(Serialize, ToSchema)]
pub struct LessonSummaryResponse {
    pub id: Uuid,
    pub scenario: String,
    pub target_language: String,
    pub difficulty: String,
    pub exercise_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<LessonSummary> for LessonSummaryResponse {
    fn from(s: LessonSummary) -> Self {
        Self {
            id: s.id,
            scenario: s.scenario,
            target_language: s.target_language,
            difficulty: s.difficulty,
            exercise_count: s.exercise_count,
            created_at: s.created_at,
        }
    }
}

/// One page of lesson summaries, newest first.
#[derive(Serialize, ToSchema)]
pub struct LessonPageResponse {
    pub items: Vec<LessonSummaryResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// A conversation row in a paginated listing.
#[derive(Serialize, ToSchema)]
pub struct ConversationSummaryResponse {
    pub id: Uuid,
    pub target_language: String,
    pub scenario_context: Option<String>,
    pub turn_count: i64,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.id,
            target_language: s.target_language,
            scenario_context: s.scenario_context,
            turn_count: s.turn_count,
            created_at: s.created_at,
            ended_at: s.ended_at,
        }
    }
}

/// One page of conversation summaries, newest first.
#[derive(Serialize, ToSchema)]
pub struct ConversationPageResponse {
    pub items: Vec<ConversationSummaryResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

//=========================================================================================
// Conversation Handlers
//=========================================================================================

/// Start a new conversation session.
#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 201, description = "Conversation started", body = ConversationResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn start_conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<StartConversationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let conversation = app_state
        .conversations
        .start(
            payload.learner_id,
            &payload.target_language,
            payload.scenario_context.as_deref(),
        )
        .await
        .map_err(|e| port_error_response("start a conversation", e))?;

    Ok((StatusCode::CREATED, Json(ConversationResponse::from(conversation))))
}

/// Submit one user message and receive the tutor's reply.
#[utoipa::path(
    post,
    path = "/api/conversations/{conversation_id}/message",
    request_body = SubmitMessageRequest,
    responses(
        (status = 200, description = "Tutor replied", body = TurnReplyResponse),
        (status = 404, description = "Conversation not found"),
        (status = 409, description = "Conversation is closed"),
        (status = 500, description = "Reply generation failed")
    ),
    params(
        ("conversation_id" = Uuid, Path, description = "The conversation to advance.")
    )
)]
pub async fn submit_message_handler(
    State(app_state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<SubmitMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let reply = app_state
        .conversations
        .submit_turn(conversation_id, &payload.text)
        .await
        .map_err(|e| port_error_response("submit a message", e))?;

    Ok(Json(TurnReplyResponse { reply: reply.reply, correction: reply.correction }))
}

/// Close a conversation. Closed conversations refuse further messages.
#[utoipa::path(
    post,
    path = "/api/conversations/{conversation_id}/close",
    responses(
        (status = 200, description = "Conversation closed", body = ConversationResponse),
        (status = 404, description = "Conversation not found")
    ),
    params(
        ("conversation_id" = Uuid, Path, description = "The conversation to close.")
    )
)]
pub async fn close_conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let conversation = app_state
        .conversations
        .close(conversation_id)
        .await
        .map_err(|e| port_error_response("close the conversation", e))?;

    Ok(Json(ConversationResponse::from(conversation)))
}

/// Fetch a conversation with its full ordered transcript.
#[utoipa::path(
    get,
    path = "/api/conversations/{conversation_id}",
    responses(
        (status = 200, description = "Conversation transcript", body = TranscriptResponse),
        (status = 404, description = "Conversation not found")
    ),
    params(
        ("conversation_id" = Uuid, Path, description = "The conversation to fetch.")
    )
)]
pub async fn get_transcript_handler(
    State(app_state): State<Arc<AppState>>,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (conversation, turns) = app_state
        .conversations
        .transcript(conversation_id)
        .await
        .map_err(|e| port_error_response("fetch the transcript", e))?;

    Ok(Json(TranscriptResponse {
        conversation: ConversationResponse::from(conversation),
        turns: turns.into_iter().map(TurnResponse::from).collect(),
    }))
}

//=========================================================================================
// Worksheet Handlers
//=========================================================================================

/// Generate a worksheet and persist it as a lesson.
#[utoipa::path(
    post,
    path = "/api/worksheets",
    request_body = WorksheetRequest,
    responses(
        (status = 201, description = "Worksheet generated and stored", body = CreateWorksheetResponse),
        (status = 500, description = "Generation or validation failed")
    )
)]
pub async fn create_worksheet_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<WorksheetRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (lesson, exercises) = app_state
        .worksheets
        .generate_and_persist(&payload)
        .await
        .map_err(|e| port_error_response("generate the worksheet", e))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateWorksheetResponse {
            lesson_id: lesson.id,
            version: lesson.version,
            worksheet: lesson.worksheet,
            exercise_ids: exercises.into_iter().map(|e| e.id).collect(),
        }),
    ))
}

/// Generate a worksheet without persisting it.
#[utoipa::path(
    post,
    path = "/api/worksheets/preview",
    request_body = WorksheetRequest,
    responses(
        (status = 200, description = "Generated worksheet document", body = Object),
        (status = 500, description = "Generation or validation failed")
    )
)]
pub async fn preview_worksheet_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<WorksheetRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let worksheet = app_state
        .worksheets
        .generate(&payload)
        .await
        .map_err(|e| port_error_response("generate the worksheet", e))?;

    Ok(Json(worksheet))
}

/// Fetch a stored lesson with its exercises. Correct answers are withheld.
#[utoipa::path(
    get,
    path = "/api/worksheets/{lesson_id}",
    responses(
        (status = 200, description = "Lesson with answer-free exercises", body = LessonDetailResponse),
        (status = 404, description = "Lesson not found")
    ),
    params(
        ("lesson_id" = Uuid, Path, description = "The lesson to fetch.")
    )
)]
pub async fn get_worksheet_handler(
    State(app_state): State<Arc<AppState>>,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (lesson, exercises) = app_state
        .db
        .get_lesson(lesson_id)
        .await
        .map_err(|e| port_error_response("fetch the lesson", e))?;

    Ok(Json(LessonDetailResponse::new(lesson, exercises)))
}

/// Grade a learner's answer against a stored exercise.
#[utoipa::path(
    post,
    path = "/api/worksheets/evaluate",
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Grading verdict", body = EvaluationResponse),
        (status = 404, description = "Exercise not found"),
        (status = 500, description = "Grading failed")
    )
)]
pub async fn evaluate_answer_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let evaluation = app_state
        .evaluations
        .evaluate(payload.exercise_id, payload.learner_id, &payload.answer)
        .await
        .map_err(|e| port_error_response("evaluate the answer", e))?;

    Ok(Json(EvaluationResponse::from(evaluation)))
}

//=========================================================================================
// Listing Handlers
//=========================================================================================

/// List stored lessons, newest first.
#[utoipa::path(
    get,
    path = "/api/lessons",
    responses(
        (status = 200, description = "One page of lesson summaries", body = LessonPageResponse)
    ),
    params(ListQuery)
)]
pub async fn list_lessons_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = Page::clamped(query.page, query.page_size);
    let (items, total) = app_state
        .db
        .list_lessons(query.learner_id, page)
        .await
        .map_err(|e| port_error_response("list lessons", e))?;

    Ok(Json(LessonPageResponse {
        items: items.into_iter().map(LessonSummaryResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

/// List past conversations, newest first.
#[utoipa::path(
    get,
    path = "/api/lessons/conversations",
    responses(
        (status = 200, description = "One page of conversation summaries", body = ConversationPageResponse)
    ),
    params(ListQuery)
)]
pub async fn list_conversations_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = Page::clamped(query.page, query.page_size);
    let (items, total) = app_state
        .db
        .list_conversations(query.learner_id, page)
        .await
        .map_err(|e| port_error_response("list conversations", e))?;

    Ok(Json(ConversationPageResponse {
        items: items.into_iter().map(ConversationSummaryResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::domain::{ExerciseKind, WorksheetExercise};

    fn sample_lesson() -> (Lesson, Vec<Exercise>) {
        let lesson_id = Uuid::new_v4();
        let lesson = Lesson {
            id: lesson_id,
            learner_id: Uuid::new_v4(),
            target_language: "fr".to_string(),
            scenario: "at the bakery".to_string(),
            grammar_focus: None,
            difficulty: "A1".to_string(),
            worksheet: Worksheet {
                scenario_summary: "Buying bread.".to_string(),
                vocabulary: vec![VocabItem {
                    word: "le pain".to_string(),
                    translation: "bread".to_string(),
                    example_sentence: "Je voudrais du pain.".to_string(),
                }],
                grammar_focus: "present tense".to_string(),
                explanations: "…".to_string(),
                exercises: vec![WorksheetExercise {
                    kind: ExerciseKind::FillBlank,
                    question: "Je ___ une baguette.".to_string(),
                    answer: "voudrais".to_string(),
                    hint: None,
                }],
                roleplay_prompts: vec!["Order a croissant.".to_string()],
            },
            version: 1,
            created_at: Utc::now(),
        };
        let exercises = vec![Exercise {
            id: Uuid::new_v4(),
            lesson_id,
            kind: ExerciseKind::FillBlank,
            question: "Je ___ une baguette.".to_string(),
            correct_answer: "voudrais".to_string(),
            hint: None,
            order_index: 0,
        }];
        (lesson, exercises)
    }

    #[test]
    fn lesson_detail_never_serializes_correct_answers() {
        let (lesson, exercises) = sample_lesson();
        let response = LessonDetailResponse::new(lesson, exercises);
        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("voudrais"), "answer leaked: {}", json);
        assert!(json.contains("Je ___ une baguette."));
        assert!(json.contains("le pain"));
    }

    #[test]
    fn not_found_maps_to_404_and_closed_to_409() {
        let (status, _) =
            port_error_response("x", PortError::NotFound("Lesson not found".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            port_error_response("x", PortError::ConversationClosed(Uuid::new_v4()));
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn unexpected_errors_are_not_echoed_to_clients() {
        let (status, body) = port_error_response(
            "list lessons",
            PortError::Unexpected("connection pool timed out".to_string()),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("pool"));
    }
}
