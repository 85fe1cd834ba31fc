//! services/api/src/services/worksheet.rs
//!
//! Stateless worksheet generation: builds the structured generation prompt,
//! calls the model in JSON mode, validates the document shape, and
//! optionally persists the lesson and its exercises in one transaction.

use lingua_core::domain::{Exercise, Lesson, Worksheet};
use lingua_core::ports::{
    ChatCompletionService, CompletionOptions, DatabaseService, PortError, PortResult,
};
use lingua_core::prompt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

fn default_difficulty() -> String {
    "A1".to_string()
}

/// A worksheet generation request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WorksheetRequest {
    /// The learner this worksheet belongs to; a guest learner is created
    /// when omitted.
    pub learner_id: Option<Uuid>,
    /// Free-text scenario, e.g. "ordering dinner at a restaurant".
    pub scenario: String,
    /// ISO language code of the target language.
    pub target_language: String,
    /// Optional grammar topic every exercise must practice.
    pub grammar_focus: Option<String>,
    /// CEFR difficulty tag (A1-C2).
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

#[derive(Clone)]
pub struct WorksheetService {
    db: Arc<dyn DatabaseService>,
    chat: Arc<dyn ChatCompletionService>,
}

impl WorksheetService {
    pub fn new(db: Arc<dyn DatabaseService>, chat: Arc<dyn ChatCompletionService>) -> Self {
        Self { db, chat }
    }

    /// Generates a worksheet via the model and returns the validated document.
    pub async fn generate(&self, request: &WorksheetRequest) -> PortResult<Worksheet> {
        let messages = prompt::worksheet_messages(
            &request.scenario,
            &request.target_language,
            request.grammar_focus.as_deref(),
            &request.difficulty,
        );
        let options = CompletionOptions { temperature: 0.4, max_tokens: 4096 };
        let value = self.chat.complete_json(&messages, options).await?;

        let worksheet: Worksheet = serde_json::from_value(value).map_err(|e| {
            PortError::MalformedGeneration(format!("Worksheet failed schema validation: {}", e))
        })?;
        if worksheet.exercises.is_empty() {
            return Err(PortError::MalformedGeneration(
                "Worksheet contains no exercises".to_string(),
            ));
        }
        if worksheet.vocabulary.is_empty() {
            return Err(PortError::MalformedGeneration(
                "Worksheet contains no vocabulary".to_string(),
            ));
        }
        Ok(worksheet)
    }

    /// Generates a worksheet and stores the lesson plus its exercises.
    /// Nothing is written unless the generated document validates.
    pub async fn generate_and_persist(
        &self,
        request: &WorksheetRequest,
    ) -> PortResult<(Lesson, Vec<Exercise>)> {
        let worksheet = self.generate(request).await?;
        let learner = self.db.ensure_learner(request.learner_id).await?;
        let (lesson, exercises) = self
            .db
            .persist_lesson(
                learner.id,
                &request.target_language,
                &request.scenario,
                request.grammar_focus.as_deref(),
                &request.difficulty,
                &worksheet,
            )
            .await?;
        info!(
            "Persisted lesson {} with {} exercises for learner {}",
            lesson.id,
            exercises.len(),
            learner.id
        );
        Ok((lesson, exercises))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MemoryDb, ScriptedChat};
    use lingua_core::domain::ExerciseKind;
    use lingua_core::ports::Page;

    fn request() -> WorksheetRequest {
        WorksheetRequest {
            learner_id: None,
            scenario: "at the bakery".to_string(),
            target_language: "fr".to_string(),
            grammar_focus: Some("present tense".to_string()),
            difficulty: "A2".to_string(),
        }
    }

    fn valid_worksheet_json() -> String {
        serde_json::json!({
            "scenario_summary": "You are buying bread at a bakery in Paris.",
            "vocabulary": [
                {"word": "le pain", "translation": "bread", "example_sentence": "Je voudrais du pain."}
            ],
            "grammar_focus": "present tense",
            "explanations": "The present tense describes current actions.",
            "exercises": [
                {"type": "fill_blank", "question": "Je ___ une baguette.", "answer": "voudrais", "hint": null},
                {"type": "translation", "question": "Translate: I would like bread.", "answer": "Je voudrais du pain.", "hint": "polite form"}
            ],
            "roleplay_prompts": ["Order two croissants.", "Ask about the price.", "Say goodbye."]
        })
        .to_string()
    }

    #[tokio::test]
    async fn generate_and_persist_stores_lesson_and_ordered_exercises() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok(valid_worksheet_json())]));
        let svc = WorksheetService::new(db.clone(), chat);

        let (lesson, exercises) = svc.generate_and_persist(&request()).await.unwrap();

        assert_eq!(lesson.difficulty, "A2");
        assert_eq!(lesson.worksheet.exercises.len(), 2);
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].kind, ExerciseKind::FillBlank);
        assert_eq!(exercises[0].order_index, 0);
        assert_eq!(exercises[1].kind, ExerciseKind::Translation);
        assert_eq!(exercises[1].order_index, 1);
        assert_eq!(db.lessons.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_exercises_field_fails_validation_and_persists_nothing() {
        let db = Arc::new(MemoryDb::default());
        let without_exercises = serde_json::json!({
            "scenario_summary": "…",
            "vocabulary": [
                {"word": "el pan", "translation": "bread", "example_sentence": "Quiero pan."}
            ],
            "grammar_focus": "present tense",
            "explanations": "…",
            "roleplay_prompts": ["Hola"]
        })
        .to_string();
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok(without_exercises)]));
        let svc = WorksheetService::new(db.clone(), chat);

        let result = svc.generate_and_persist(&request()).await;
        assert!(matches!(result, Err(PortError::MalformedGeneration(_))));
        assert!(db.lessons.lock().unwrap().is_empty());
        assert!(db.exercises.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparsable_model_output_is_malformed_generation() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok(
            "Sure! Here's your worksheet:".to_string()
        )]));
        let svc = WorksheetService::new(db, chat);

        let result = svc.generate(&request()).await;
        assert!(matches!(result, Err(PortError::MalformedGeneration(_))));
    }

    #[tokio::test]
    async fn lesson_listing_paginates_newest_first() {
        let db = Arc::new(MemoryDb::default());
        let learner = db.ensure_learner(None).await.unwrap();
        let worksheet: Worksheet =
            serde_json::from_str(&valid_worksheet_json()).unwrap();
        for i in 0..25 {
            db.persist_lesson(
                learner.id,
                "fr",
                &format!("scenario {i}"),
                None,
                "A1",
                &worksheet,
            )
            .await
            .unwrap();
        }

        let (items, total) = db
            .list_lessons(None, Page::clamped(Some(2), Some(20)))
            .await
            .unwrap();
        assert_eq!(total, 25);
        assert_eq!(items.len(), 5);
    }
}
