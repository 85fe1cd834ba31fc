//! crates/lingua_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; the worksheet document is
//! serde-modeled because it is generated by (and stored as) JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a learner (registered or auto-created guest).
#[derive(Debug, Clone)]
pub struct Learner {
    pub id: Uuid,
    pub display_name: String,
    pub native_language: String,
    pub created_at: DateTime<Utc>,
}

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(TurnRole::User),
            "assistant" => Some(TurnRole::Assistant),
            _ => None,
        }
    }
}

/// A multi-turn tutoring conversation session.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub target_language: String,
    pub scenario_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// A conversation is closed once its end timestamp is set; closed
    /// conversations no longer accept turns.
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// A single turn inside a conversation. Turns are append-only and indexed
/// by a gapless, zero-based sequence per conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: TurnRole,
    pub text: String,
    /// Carried through the schema and transcript but never written by any
    /// current code path; the inline correction is only reported on the
    /// submit-turn response.
    pub corrected_text: Option<String>,
    pub turn_index: i32,
    pub created_at: DateTime<Utc>,
}

/// The kind of a generated exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    FillBlank,
    Conjugation,
    SentenceBuilding,
    Translation,
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::FillBlank => "fill_blank",
            ExerciseKind::Conjugation => "conjugation",
            ExerciseKind::SentenceBuilding => "sentence_building",
            ExerciseKind::Translation => "translation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fill_blank" => Some(ExerciseKind::FillBlank),
            "conjugation" => Some(ExerciseKind::Conjugation),
            "sentence_building" => Some(ExerciseKind::SentenceBuilding),
            "translation" => Some(ExerciseKind::Translation),
            _ => None,
        }
    }
}

/// A persisted worksheet lesson, owning an ordered set of exercises.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub target_language: String,
    pub scenario: String,
    pub grammar_focus: Option<String>,
    pub difficulty: String,
    pub worksheet: Worksheet,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// A single exercise row belonging to a lesson.
#[derive(Debug, Clone)]
pub struct Exercise {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub kind: ExerciseKind,
    pub question: String,
    pub correct_answer: String,
    pub hint: Option<String>,
    pub order_index: i32,
}

/// One graded submission against an exercise. Append-only.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub learner_id: Uuid,
    pub answer: String,
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// A new, not-yet-persisted attempt record.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub exercise_id: Uuid,
    pub learner_id: Uuid,
    pub answer: String,
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
}

/// The result of grading a submission, augmented with the stored correct
/// answer (always sourced from the exercise row, never the model's echo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_correct: bool,
    pub score: f64,
    pub feedback: String,
    pub correct_answer: String,
}

//=========================================================================================
// The Generated Worksheet Document
//=========================================================================================

/// A single vocabulary entry in a worksheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabItem {
    pub word: String,
    pub translation: String,
    pub example_sentence: String,
}

/// A generated exercise inside a worksheet document (pre-persistence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetExercise {
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
}

/// The full structured worksheet document produced by the generation model.
/// Missing required fields fail deserialization, which is the schema check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    pub scenario_summary: String,
    pub vocabulary: Vec<VocabItem>,
    pub grammar_focus: String,
    pub explanations: String,
    pub exercises: Vec<WorksheetExercise>,
    pub roleplay_prompts: Vec<String>,
}

//=========================================================================================
// List Summaries
//=========================================================================================

/// A lightweight lesson row for paginated listings.
#[derive(Debug, Clone)]
pub struct LessonSummary {
    pub id: Uuid,
    pub scenario: String,
    pub target_language: String,
    pub difficulty: String,
    pub exercise_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A lightweight conversation row for paginated listings.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub target_language: String,
    pub scenario_context: Option<String>,
    pub turn_count: i64,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}
