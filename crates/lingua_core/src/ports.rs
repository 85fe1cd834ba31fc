//! crates/lingua_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Attempt, Conversation, ConversationSummary, Exercise, Learner, Lesson, LessonSummary,
    NewAttempt, Turn, TurnRole, Worksheet,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conversation {0} is closed and no longer accepts turns")]
    ConversationClosed(Uuid),
    #[error("Upstream generation failed: {0}")]
    UpstreamGeneration(String),
    #[error("Generated content was malformed: {0}")]
    MalformedGeneration(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Pagination
//=========================================================================================

/// A validated page request: 1-based page number, page size in [1, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Clamps raw query parameters into a valid page request.
    pub fn clamped(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

//=========================================================================================
// Chat Completion Types
//=========================================================================================

/// The role of a chat message sent to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<TurnRole> for ChatRole {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => ChatRole::User,
            TurnRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// A single role-tagged message for the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Tuning knobs for a single completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { temperature: 0.4, max_tokens: 2048 }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Learner Management ---

    /// Resolves a learner, creating a default guest record when the caller
    /// supplied no identity (or an identity that does not exist yet).
    async fn ensure_learner(&self, learner_id: Option<Uuid>) -> PortResult<Learner>;

    // --- Conversation Management ---

    async fn create_conversation(
        &self,
        learner_id: Uuid,
        target_language: &str,
        scenario_context: Option<&str>,
    ) -> PortResult<Conversation>;

    async fn get_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation>;

    /// Sets the conversation's end timestamp. Idempotent: closing an
    /// already-closed conversation keeps the original timestamp.
    async fn close_conversation(&self, conversation_id: Uuid) -> PortResult<Conversation>;

    /// All turns of a conversation, ordered by turn index.
    async fn list_turns(&self, conversation_id: Uuid) -> PortResult<Vec<Turn>>;

    /// Appends a turn, assigning the next turn index atomically with the
    /// insert. Concurrent writers against the same conversation conflict on
    /// the (conversation, index) uniqueness rather than corrupt the sequence.
    async fn append_turn(
        &self,
        conversation_id: Uuid,
        role: TurnRole,
        text: &str,
    ) -> PortResult<Turn>;

    async fn list_conversations(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<ConversationSummary>, i64)>;

    // --- Lesson & Exercise Management ---

    /// Inserts the lesson row (with the embedded worksheet document) and one
    /// exercise row per generated exercise, preserving array order, inside a
    /// single transaction. Either all rows commit or none do.
    async fn persist_lesson(
        &self,
        learner_id: Uuid,
        target_language: &str,
        scenario: &str,
        grammar_focus: Option<&str>,
        difficulty: &str,
        worksheet: &Worksheet,
    ) -> PortResult<(Lesson, Vec<Exercise>)>;

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<(Lesson, Vec<Exercise>)>;

    async fn list_lessons(
        &self,
        learner_id: Option<Uuid>,
        page: Page,
    ) -> PortResult<(Vec<LessonSummary>, i64)>;

    async fn get_exercise(&self, exercise_id: Uuid) -> PortResult<Exercise>;

    async fn record_attempt(&self, attempt: NewAttempt) -> PortResult<Attempt>;
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Sends a chat completion request and returns the assistant's text.
    /// Fails with `UpstreamGeneration` if the model returns no content.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> PortResult<String>;

    /// Chat completion in structured-output (JSON) mode. Fails with
    /// `MalformedGeneration` if the model output cannot be parsed as JSON.
    async fn complete_json(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> PortResult<serde_json::Value>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a slice of audio data into text.
    async fn transcribe(&self, audio_data: &[u8], language: &str) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn synthesize(&self, text: &str, language: &str) -> PortResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_when_unspecified() {
        let page = Page::clamped(None, None);
        assert_eq!(page, Page { page: 1, page_size: 20 });
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn page_clamps_out_of_range_values() {
        let page = Page::clamped(Some(0), Some(500));
        assert_eq!(page, Page { page: 1, page_size: 100 });

        let page = Page::clamped(Some(3), Some(0));
        assert_eq!(page, Page { page: 3, page_size: 1 });
    }

    #[test]
    fn page_offset_arithmetic() {
        let page = Page::clamped(Some(2), Some(20));
        assert_eq!(page.offset(), 20);
    }
}
