//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingua_core::domain::{
    Attempt, Conversation, ConversationSummary, Exercise, ExerciseKind, Learner, Lesson,
    LessonSummary, NewAttempt, Turn, TurnRole, Worksheet,
};
use lingua_core::ports::{DatabaseService, Page, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LearnerRecord {
    id: Uuid,
    display_name: String,
    native_language: String,
    created_at: DateTime<Utc>,
}
impl LearnerRecord {
    fn to_domain(self) -> Learner {
        Learner {
            id: self.id,
            display_name: self.display_name,
            native_language: self.native_language,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    learner_id: Uuid,
    target_language: String,
    scenario_context: Option<String>,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}
impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            id: self.id,
            learner_id: self.learner_id,
            target_language: self.target_language,
            scenario_context: self.scenario_context,
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }
}

#[derive(FromRow)]
struct TurnRecord {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    text: String,
    corrected_text: Option<String>,
    turn_index: i32,
    created_at: DateTime<Utc>,
}
impl TurnRecord {
    fn to_domain(self) -> PortResult<Turn> {
        let role = TurnRole::parse(&self.role).ok_or_else(|| {
            PortError::Unexpected(format!("Turn {} has unknown role '{}'", self.id, self.role))
        })?;
        Ok(Turn {
            id: self.id,
            conversation_id: self.conversation_id,
            role,
            text: self.text,
            corrected_text: self.corrected_text,
            turn_index: self.turn_index,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    learner_id: Uuid,
    target_language: String,
    scenario: String,
    grammar_focus: Option<String>,
    difficulty: String,
    worksheet: serde_json::Value,
    version: i32,
    created_at: DateTime<Utc>,
}
impl LessonRecord {
    fn to_domain(self) -> PortResult<Lesson> {
        let worksheet: Worksheet = serde_json::from_value(self.worksheet).map_err(|e| {
            PortError::Unexpected(format!("Lesson {} has invalid worksheet JSON: {}", self.id, e))
        })?;
        Ok(Lesson {
            id: self.id,
            learner_id: self.learner_id,
            target_language: self.target_language,
            scenario: self.scenario,
            grammar_focus: self.grammar_focus,
            difficulty: self.difficulty,
            worksheet,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExerciseRecord {
    id: Uuid,
    lesson_id: Uuid,
    kind: String,
    question: String,
    correct_answer: String,
    hint: Option<String>,
    order_index: i32,
}
impl ExerciseRecord {
    fn to_domain(self) -> PortResult<Exercise> {
        let kind = ExerciseKind::parse(&self.kind).ok_or_else(|| {
            PortError::Unexpected(format!("Exercise {} has unknown kind '{}'", self.id, self.kind))
        })?;
        Ok(Exercise {
            id: self.id,
            lesson_id: self.lesson_id,
            kind,
            question: self.question,
            correct_answer: self.correct_answer,
            hint: self.hint,
            order_index: self.order_index,
        })
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: Uuid,
    exercise_id: Uuid,
    learner_id: Uuid,
    answer: String,
    is_correct: bool,
    score: f64,
    feedback: String,
    created_at: DateTime<Utc>,
}
impl AttemptRecord {
    fn to_domain(self) -> Attempt {
        Attempt {
            id: self.id,
            exercise_id: self.exercise_id,
            learner_id: self.learner_id,
            answer: self.answer,
            is_correct: self.is_correct,
            score: self.score,
            feedback: self.feedback,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LessonSummaryRecord {
    id: Uuid,
    scenario: String,
    target_language: String,
    difficulty: String,
    exercise_count: i64,
    created_at: DateTime<Utc>,
}
impl LessonSummaryRecord {
    fn to_domain(self) -> LessonSummary {
        LessonSummary {
            id: self.id,
            scenario: self.scenario,
            target_language: self.target_language,
            difficulty: self.difficulty,
            exercise_count: self.exercise_count,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ConversationSummaryRecord {
    id: Uuid,
    target_language: String,
    scenario_context: Option<String>,
    turn_count: i64,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}
impl ConversationSummaryRecord {
    fn to_domain(self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            target_language: self.target_language,
            scenario_context: self.scenario_context,
            turn_count: self.turn_count,
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }
}

//=========================================================================================
// Private Query Helpers
//=========================================================================================

impl DbAdapter {
    /// Inserts a turn, deriving the next index from the live count inside
    /// the INSERT itself. The UNIQUE (conversation_id, turn_index)
    /// constraint turns a concurrent append into a conflict instead of a
    /// corrupted sequence.
    async fn try_append_turn(
        &self,
        conversation_id: Uuid,
        role: TurnRole,
        text: &str,
    ) -> Result<TurnRecord, sqlx::Error> {
        sqlx::query_as::<_, TurnRecord>(
            "INSERT INTO conversation_turns (id, conversation_id, role, text, turn_index) \
             VALUES ($1, $2, $3, $4, \
                 (SELECT COUNT(*)::int FROM conversation_turns WHERE conversation_id = $2)) \
             RETURNING id, conversation_id, role, text, corrected_text, turn_index, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(text)
        .fetch_one(&self.pool)
        .await
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn ensure_learner(&self, learner_id: Option<Uuid>) -> PortResult<Learner> {
        let id = learner_id.unwrap_or_else(Uuid::new_v4);
        sqlx::query(
            "INSERT INTO learners (id, display_name, native_language) \
             VALUES ($1, 'Guest Learner', 'en') ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, LearnerRecord>(
            "SELECT id, display_name, native_language, created_at FROM learners WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn create_conversation(
        &self,
        learner_id: Uuid,
        target_language: &str,
        scenario_context: Option<&str>,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (id, learner_id, target_language, scenario_context) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, learner_id, target_language, scenario_context, created_at, ended_at",
        )
        .bind(Uuid::new_v4())
        .bind(learner_id)
        .bind(target_language)
        .bind(scenario_context)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, learner_id, target_language, scenario_context, created_at, ended_at \
             FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Conversation {} not found", conversation_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn close_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "UPDATE conversations SET ended_at = COALESCE(ended_at, now()) WHERE id = $1 \
             RETURNING id, learner_id, target_language, scenario_context, created_at, ended_at",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Conversation {} not found", conversation_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_turns(&self, conversation_id: Uuid) -> PortResult<Vec<Turn>> {
        let records = sqlx::query_as::<_, TurnRecord>(
            "SELECT id, conversation_id, role, text, corrected_text, turn_index, created_at \
             FROM conversation_turns WHERE conversation_id = $1 ORDER BY turn_index ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn append_turn(
        &self,
        conversation_id: Uuid,
        role: TurnRole,
        text: &str,
    ) -> PortResult<Turn> {
        let record = match self.try_append_turn(conversation_id, role, text).await {
            // One concurrent writer won the index; recompute and try again.
            Err(e) if is_unique_violation(&e) => self
                .try_append_turn(conversation_id, role, text)
                .await
                .map_err(unexpected)?,
            other => other.map_err(unexpected)?,
        };
        record.to_domain()
    }

    async fn list_conversations(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<ConversationSummary>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversations WHERE ($1::uuid IS NULL OR learner_id = $1)",
        )
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let records = sqlx::query_as::<_, ConversationSummaryRecord>(
            "SELECT c.id, c.target_language, c.scenario_context, c.created_at, c.ended_at, \
                 (SELECT COUNT(*) FROM conversation_turns t WHERE t.conversation_id = c.id) AS turn_count \
             FROM conversations c \
             WHERE ($1::uuid IS NULL OR c.learner_id = $1) \
             ORDER BY c.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(learner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok((records.into_iter().map(|r| r.to_domain()).collect(), total))
    }

    async fn persist_lesson(
        &self,
        learner_id: Uuid,
        target_language: &str,
        scenario: &str,
        grammar_focus: Option<&str>,
        difficulty: &str,
        worksheet: &Worksheet,
    ) -> PortResult<(Lesson, Vec<Exercise>)> {
        let worksheet_json = serde_json::to_value(worksheet)
            .map_err(|e| PortError::Unexpected(format!("Failed to serialize worksheet: {}", e)))?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let lesson_record = sqlx::query_as::<_, LessonRecord>(
            "INSERT INTO lessons \
                 (id, learner_id, target_language, scenario, grammar_focus, difficulty, worksheet) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, learner_id, target_language, scenario, grammar_focus, difficulty, \
                 worksheet, version, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(learner_id)
        .bind(target_language)
        .bind(scenario)
        .bind(grammar_focus)
        .bind(difficulty)
        .bind(worksheet_json)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let mut exercises = Vec::with_capacity(worksheet.exercises.len());
        for (idx, ex) in worksheet.exercises.iter().enumerate() {
            let record = sqlx::query_as::<_, ExerciseRecord>(
                "INSERT INTO exercises \
                     (id, lesson_id, kind, question, correct_answer, hint, order_index) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id, lesson_id, kind, question, correct_answer, hint, order_index",
            )
            .bind(Uuid::new_v4())
            .bind(lesson_record.id)
            .bind(ex.kind.as_str())
            .bind(&ex.question)
            .bind(&ex.answer)
            .bind(&ex.hint)
            .bind(idx as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            exercises.push(record.to_domain()?);
        }

        tx.commit().await.map_err(unexpected)?;

        Ok((lesson_record.to_domain()?, exercises))
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<(Lesson, Vec<Exercise>)> {
        let lesson_record = sqlx::query_as::<_, LessonRecord>(
            "SELECT id, learner_id, target_language, scenario, grammar_focus, difficulty, \
                 worksheet, version, created_at \
             FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Lesson {} not found", lesson_id))
            }
            _ => unexpected(e),
        })?;

        let exercise_records = sqlx::query_as::<_, ExerciseRecord>(
            "SELECT id, lesson_id, kind, question, correct_answer, hint, order_index \
             FROM exercises WHERE lesson_id = $1 ORDER BY order_index ASC",
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let exercises = exercise_records
            .into_iter()
            .map(|r| r.to_domain())
            .collect::<PortResult<Vec<_>>>()?;

        Ok((lesson_record.to_domain()?, exercises))
    }

    async fn list_lessons(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<LessonSummary>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lessons WHERE ($1::uuid IS NULL OR learner_id = $1)",
        )
        .bind(learner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        let records = sqlx::query_as::<_, LessonSummaryRecord>(
            "SELECT l.id, l.scenario, l.target_language, l.difficulty, l.created_at, \
                 (SELECT COUNT(*) FROM exercises e WHERE e.lesson_id = l.id) AS exercise_count \
             FROM lessons l \
             WHERE ($1::uuid IS NULL OR l.learner_id = $1) \
             ORDER BY l.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(learner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok((records.into_iter().map(|r| r.to_domain()).collect(), total))
    }

    async fn get_exercise(&self, exercise_id: Uuid) -> PortResult<Exercise> {
        let record = sqlx::query_as::<_, ExerciseRecord>(
            "SELECT id, lesson_id, kind, question, correct_answer, hint, order_index \
             FROM exercises WHERE id = $1",
        )
        .bind(exercise_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Exercise {} not found", exercise_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> PortResult<Attempt> {
        let record = sqlx::query_as::<_, AttemptRecord>(
            "INSERT INTO exercise_attempts \
                 (id, exercise_id, learner_id, answer, is_correct, score, feedback) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, exercise_id, learner_id, answer, is_correct, score, feedback, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(attempt.exercise_id)
        .bind(attempt.learner_id)
        .bind(&attempt.answer)
        .bind(attempt.is_correct)
        .bind(attempt.score)
        .bind(&attempt.feedback)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }
}
