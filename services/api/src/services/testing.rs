//! services/api/src/services/testing.rs
//!
//! In-memory implementations of the core ports, used by the service-level
//! unit tests. `MemoryDb` mirrors the contract of the Postgres adapter
//! (derived turn indices, cascade-free flat storage, newest-first listings)
//! closely enough to exercise the orchestration logic.

use async_trait::async_trait;
use chrono::Utc;
use lingua_core::domain::{
    Attempt, Conversation, ConversationSummary, Exercise, Learner, Lesson, LessonSummary,
    NewAttempt, Turn, TurnRole, Worksheet,
};
use lingua_core::ports::{
    ChatCompletionService, ChatMessage, CompletionOptions, DatabaseService, Page, PortError,
    PortResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDb {
    pub learners: Mutex<HashMap<Uuid, Learner>>,
    pub conversations: Mutex<HashMap<Uuid, Conversation>>,
    pub turns: Mutex<Vec<Turn>>,
    pub lessons: Mutex<Vec<Lesson>>,
    pub exercises: Mutex<Vec<Exercise>>,
    pub attempts: Mutex<Vec<Attempt>>,
}

impl MemoryDb {
    pub fn turns_for(&self, conversation_id: Uuid) -> Vec<Turn> {
        let mut turns: Vec<Turn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_index);
        turns
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn ensure_learner(&self, learner_id: Option<Uuid>) -> PortResult<Learner> {
        let id = learner_id.unwrap_or_else(Uuid::new_v4);
        let mut learners = self.learners.lock().unwrap();
        let learner = learners.entry(id).or_insert_with(|| Learner {
            id,
            display_name: "Guest Learner".to_string(),
            native_language: "en".to_string(),
            created_at: Utc::now(),
        });
        Ok(learner.clone())
    }

    async fn create_conversation(
        &self,
        learner_id: Uuid,
        target_language: &str,
        scenario_context: Option<&str>,
    ) -> PortResult<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            learner_id,
            target_language: target_language.to_string(),
            scenario_context: scenario_context.map(str::to_string),
            created_at: Utc::now(),
            ended_at: None,
        };
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        self.conversations
            .lock()
            .unwrap()
            .get(&conversation_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Conversation {} not found", conversation_id)))
    }

    async fn close_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations.get_mut(&conversation_id).ok_or_else(|| {
            PortError::NotFound(format!("Conversation {} not found", conversation_id))
        })?;
        conversation.ended_at.get_or_insert_with(Utc::now);
        Ok(conversation.clone())
    }

    async fn list_turns(&self, conversation_id: Uuid) -> PortResult<Vec<Turn>> {
        Ok(self.turns_for(conversation_id))
    }

    async fn append_turn(
        &self,
        conversation_id: Uuid,
        role: TurnRole,
        text: &str,
    ) -> PortResult<Turn> {
        let mut turns = self.turns.lock().unwrap();
        let turn_index = turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .count() as i32;
        let turn = Turn {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            text: text.to_string(),
            corrected_text: None,
            turn_index,
            created_at: Utc::now(),
        };
        turns.push(turn.clone());
        Ok(turn)
    }

    async fn list_conversations(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<ConversationSummary>, i64)> {
        let conversations = self.conversations.lock().unwrap();
        let mut matching: Vec<&Conversation> = conversations
            .values()
            .filter(|c| learner_id.map_or(true, |l| c.learner_id == l))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|c| ConversationSummary {
                id: c.id,
                target_language: c.target_language.clone(),
                scenario_context: c.scenario_context.clone(),
                turn_count: self.turns_for(c.id).len() as i64,
                created_at: c.created_at,
                ended_at: c.ended_at,
            })
            .collect();
        Ok((items, total))
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
        let lesson = Lesson {
            id: Uuid::new_v4(),
            learner_id,
            target_language: target_language.to_string(),
            scenario: scenario.to_string(),
            grammar_focus: grammar_focus.map(str::to_string),
            difficulty: difficulty.to_string(),
            worksheet: worksheet.clone(),
            version: 1,
            created_at: Utc::now(),
        };
        let exercises: Vec<Exercise> = worksheet
            .exercises
            .iter()
            .enumerate()
            .map(|(idx, ex)| Exercise {
                id: Uuid::new_v4(),
                lesson_id: lesson.id,
                kind: ex.kind,
                question: ex.question.clone(),
                correct_answer: ex.answer.clone(),
                hint: ex.hint.clone(),
                order_index: idx as i32,
            })
            .collect();
        self.lessons.lock().unwrap().push(lesson.clone());
        self.exercises.lock().unwrap().extend(exercises.clone());
        Ok((lesson, exercises))
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<(Lesson, Vec<Exercise>)> {
        let lesson = self
            .lessons
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == lesson_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Lesson {} not found", lesson_id)))?;
        let mut exercises: Vec<Exercise> = self
            .exercises
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.lesson_id == lesson_id)
            .cloned()
            .collect();
        exercises.sort_by_key(|e| e.order_index);
        Ok((lesson, exercises))
    }

    async fn list_lessons(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<LessonSummary>, i64)> {
        let lessons = self.lessons.lock().unwrap();
        let mut matching: Vec<&Lesson> = lessons
            .iter()
            .filter(|l| learner_id.map_or(true, |id| l.learner_id == id))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let exercises = self.exercises.lock().unwrap();
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|l| LessonSummary {
                id: l.id,
                scenario: l.scenario.clone(),
                target_language: l.target_language.clone(),
                difficulty: l.difficulty.clone(),
                exercise_count: exercises.iter().filter(|e| e.lesson_id == l.id).count() as i64,
                created_at: l.created_at,
            })
            .collect();
        Ok((items, total))
    }

    async fn get_exercise(&self, exercise_id: Uuid) -> PortResult<Exercise> {
        self.exercises
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == exercise_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Exercise {} not found", exercise_id)))
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> PortResult<Attempt> {
        let stored = Attempt {
            id: Uuid::new_v4(),
            exercise_id: attempt.exercise_id,
            learner_id: attempt.learner_id,
            answer: attempt.answer,
            is_correct: attempt.is_correct,
            score: attempt.score,
            feedback: attempt.feedback,
            created_at: Utc::now(),
        };
        self.attempts.lock().unwrap().push(stored.clone());
        Ok(stored)
    }
}

/// A scripted chat service: pops a pre-loaded result per call and records
/// every message list it was invoked with.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn with_replies(replies: Vec<PortResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> PortResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::UpstreamGeneration("script exhausted".to_string())))
    }
}

#[async_trait]
impl ChatCompletionService for ScriptedChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> PortResult<String> {
        self.next_reply(messages)
    }

    async fn complete_json(
        &self,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> PortResult<serde_json::Value> {
        let raw = self.next_reply(messages)?;
        serde_json::from_str(&raw)
            .map_err(|e| PortError::MalformedGeneration(format!("LLM returned invalid JSON: {}", e)))
    }
}
