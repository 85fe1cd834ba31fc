//! services/api/src/services/evaluation.rs
//!
//! Stateless answer grading: sends the stored correct answer and the
//! learner's submission to the model, records the attempt, and returns the
//! evaluation.

use lingua_core::domain::{Evaluation, NewAttempt};
use lingua_core::ports::{
    ChatCompletionService, CompletionOptions, DatabaseService, PortResult,
};
use lingua_core::prompt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct EvaluationService {
    db: Arc<dyn DatabaseService>,
    chat: Arc<dyn ChatCompletionService>,
}

impl EvaluationService {
    pub fn new(db: Arc<dyn DatabaseService>, chat: Arc<dyn ChatCompletionService>) -> Self {
        Self { db, chat }
    }

    /// Grades a submission against the exercise's stored correct answer.
    ///
    /// Missing subfields in the model's verdict default to incorrect /
    /// zero / empty feedback; only unparsable JSON is an error. The
    /// returned `correct_answer` always comes from the exercise row, never
    /// from anything the model echoed back.
    pub async fn evaluate(
        &self,
        exercise_id: Uuid,
        learner_id: Option<Uuid>,
        answer: &str,
    ) -> PortResult<Evaluation> {
        let exercise = self.db.get_exercise(exercise_id).await?;
        let learner = self.db.ensure_learner(learner_id).await?;

        let messages = prompt::grading_messages(&exercise, answer);
        let options = CompletionOptions { temperature: 0.2, ..Default::default() };
        let verdict = self.chat.complete_json(&messages, options).await?;

        let evaluation = Evaluation {
            is_correct: verdict
                .get("is_correct")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            score: verdict
                .get("score")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0),
            feedback: verdict
                .get("feedback")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            correct_answer: exercise.correct_answer.clone(),
        };

        self.db
            .record_attempt(NewAttempt {
                exercise_id: exercise.id,
                learner_id: learner.id,
                answer: answer.to_string(),
                is_correct: evaluation.is_correct,
                score: evaluation.score,
                feedback: evaluation.feedback.clone(),
            })
            .await?;

        info!(
            "Recorded attempt for exercise {} by learner {} (correct: {}, score: {})",
            exercise.id, learner.id, evaluation.is_correct, evaluation.score
        );
        Ok(evaluation)
    }
}
