//! services/api/src/services/conversation.rs
//!
//! The turn orchestrator for tutoring conversations: appends the user's
//! turn, builds the LLM context from the recent transcript, obtains the
//! tutor reply, and appends it.

use lingua_core::domain::{Conversation, Turn, TurnRole};
use lingua_core::ports::{
    ChatCompletionService, CompletionOptions, DatabaseService, PortError, PortResult,
};
use lingua_core::prompt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The outcome of one successful submit: the tutor reply and, when the
/// reply carries an inline correction, the correction text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub reply: String,
    pub correction: Option<String>,
}

/// Detects an inline correction in a tutor reply.
///
/// Deliberately crude, kept for behavioral parity: a reply containing both
/// parenthesis characters is reported wholesale as the correction. It is
/// not an extraction of the corrected fragment.
fn detect_correction(reply: &str) -> Option<String> {
    if reply.contains('(') && reply.contains(')') {
        Some(reply.to_string())
    } else {
        None
    }
}

#[derive(Clone)]
pub struct ConversationService {
    db: Arc<dyn DatabaseService>,
    chat: Arc<dyn ChatCompletionService>,
}

impl ConversationService {
    pub fn new(db: Arc<dyn DatabaseService>, chat: Arc<dyn ChatCompletionService>) -> Self {
        Self { db, chat }
    }

    /// Starts a new conversation session, creating a guest learner when the
    /// caller supplied no identity.
    pub async fn start(
        &self,
        learner_id: Option<Uuid>,
        target_language: &str,
        scenario_context: Option<&str>,
    ) -> PortResult<Conversation> {
        let learner = self.db.ensure_learner(learner_id).await?;
        let conversation = self
            .db
            .create_conversation(learner.id, target_language, scenario_context)
            .await?;
        info!(
            "Started conversation {} in '{}' for learner {}",
            conversation.id, conversation.target_language, learner.id
        );
        Ok(conversation)
    }

    /// Advances a conversation by one user turn and one assistant turn.
    ///
    /// The user turn is committed before the model call and is never
    /// retracted: if the model fails, the conversation is left with the
    /// orphaned user turn and the caller may simply submit again.
    pub async fn submit_turn(
        &self,
        conversation_id: Uuid,
        user_text: &str,
    ) -> PortResult<TurnReply> {
        let conversation = self.db.get_conversation(conversation_id).await?;
        if conversation.is_closed() {
            return Err(PortError::ConversationClosed(conversation_id));
        }

        // History is read before the append; the new text rides along as
        // the final message instead.
        let history = self.db.list_turns(conversation_id).await?;

        self.db
            .append_turn(conversation_id, TurnRole::User, user_text)
            .await?;

        let messages = prompt::tutor_messages(
            &conversation.target_language,
            conversation.scenario_context.as_deref(),
            &history,
            user_text,
        );
        let options = CompletionOptions { temperature: 0.7, ..Default::default() };
        let reply = self.chat.complete(&messages, options).await?;

        self.db
            .append_turn(conversation_id, TurnRole::Assistant, &reply)
            .await?;

        let correction = detect_correction(&reply);
        info!(
            "Conversation {} advanced to {} turns (correction: {})",
            conversation_id,
            history.len() + 2,
            correction.is_some()
        );
        Ok(TurnReply { reply, correction })
    }

    /// Closes a conversation; closed conversations refuse further turns.
    pub async fn close(&self, conversation_id: Uuid) -> PortResult<Conversation> {
        let conversation = self.db.close_conversation(conversation_id).await?;
        info!("Closed conversation {}", conversation_id);
        Ok(conversation)
    }

    /// The conversation and its full ordered transcript.
    pub async fn transcript(
        &self,
        conversation_id: Uuid,
    ) -> PortResult<(Conversation, Vec<Turn>)> {
        let conversation = self.db.get_conversation(conversation_id).await?;
        let turns = self.db.list_turns(conversation_id).await?;
        Ok((conversation, turns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MemoryDb, ScriptedChat};
    use lingua_core::ports::ChatRole;

    fn service(db: Arc<MemoryDb>, chat: Arc<ScriptedChat>) -> ConversationService {
        ConversationService::new(db, chat)
    }

    #[tokio::test]
    async fn submit_turn_appends_user_then_assistant() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok(
            "Bonjour! Comment ça va?".to_string()
        )]));
        let svc = service(db.clone(), chat);

        let conversation = svc.start(None, "fr", None).await.unwrap();
        let reply = svc.submit_turn(conversation.id, "Salut!").await.unwrap();

        assert_eq!(reply.reply, "Bonjour! Comment ça va?");
        assert_eq!(reply.correction, None);

        let turns = db.turns_for(conversation.id);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].text, "Salut!");
        assert_eq!(turns[0].turn_index, 0);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].turn_index, 1);
    }

    #[tokio::test]
    async fn n_submits_produce_2n_alternating_turns() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(
            (0..3).map(|i| Ok(format!("reply {i}"))).collect(),
        ));
        let svc = service(db.clone(), chat);

        let conversation = svc.start(None, "es", None).await.unwrap();
        for i in 0..3 {
            svc.submit_turn(conversation.id, &format!("hola {i}")).await.unwrap();
        }

        let turns = db.turns_for(conversation.id);
        assert_eq!(turns.len(), 6);
        for (i, turn) in turns.iter().enumerate() {
            assert_eq!(turn.turn_index, i as i32);
            let expected = if i % 2 == 0 { TurnRole::User } else { TurnRole::Assistant };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn submit_turn_on_unknown_conversation_appends_nothing() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok("unused".to_string())]));
        let svc = service(db.clone(), chat);

        let result = svc.submit_turn(Uuid::new_v4(), "hello").await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
        assert!(db.turns.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn llm_failure_leaves_user_turn_and_retry_continues_indices() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![
            Err(PortError::UpstreamGeneration("model unavailable".to_string())),
            Ok("Ça marche!".to_string()),
        ]));
        let svc = service(db.clone(), chat);

        let conversation = svc.start(None, "fr", None).await.unwrap();
        let failed = svc.submit_turn(conversation.id, "première tentative").await;
        assert!(matches!(failed, Err(PortError::UpstreamGeneration(_))));

        // The orphaned user turn survives the failure.
        let turns = db.turns_for(conversation.id);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);

        // A retry continues from the post-failure count.
        svc.submit_turn(conversation.id, "deuxième tentative").await.unwrap();
        let turns = db.turns_for(conversation.id);
        assert_eq!(turns.len(), 3);
        assert_eq!(
            turns.iter().map(|t| t.turn_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn correction_reported_only_for_parenthesized_replies() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![
            Ok("Go (Vas-y)!".to_string()),
            Ok("Bonjour!".to_string()),
        ]));
        let svc = service(db.clone(), chat);
        let conversation = svc.start(None, "fr", None).await.unwrap();

        let corrected = svc.submit_turn(conversation.id, "go!").await.unwrap();
        assert_eq!(corrected.correction.as_deref(), Some("Go (Vas-y)!"));

        let plain = svc.submit_turn(conversation.id, "bonjour").await.unwrap();
        assert_eq!(plain.correction, None);
    }

    #[tokio::test]
    async fn llm_context_is_capped_at_memory_window() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(
            (0..13).map(|i| Ok(format!("reply {i}"))).collect(),
        ));
        let svc = service(db.clone(), chat.clone());

        let conversation = svc.start(None, "fr", None).await.unwrap();
        // Build up 12 turn-pairs of history.
        for i in 0..12 {
            svc.submit_turn(conversation.id, &format!("message {i}")).await.unwrap();
        }

        svc.submit_turn(conversation.id, "le dernier").await.unwrap();
        let call = chat.last_call();

        // system + 10 history turns + the new user message, never all 24.
        assert_eq!(call.len(), 12);
        assert_eq!(call[0].role, ChatRole::System);
        assert_eq!(call.last().unwrap().content, "le dernier");
    }

    #[tokio::test]
    async fn closed_conversation_refuses_turns() {
        let db = Arc::new(MemoryDb::default());
        let chat = Arc::new(ScriptedChat::with_replies(vec![Ok("unused".to_string())]));
        let svc = service(db.clone(), chat);

        let conversation = svc.start(None, "en", None).await.unwrap();
        let closed = svc.close(conversation.id).await.unwrap();
        assert!(closed.is_closed());

        let result = svc.submit_turn(conversation.id, "still there?").await;
        assert!(matches!(result, Err(PortError::ConversationClosed(_))));
        assert!(db.turns_for(conversation.id).is_empty());

        // Closing again keeps the original end timestamp.
        let reclosed = svc.close(conversation.id).await.unwrap();
        assert_eq!(reclosed.ended_at, closed.ended_at);
    }

    #[test]
    fn correction_heuristic_requires_both_parentheses() {
        assert_eq!(detect_correction("Go (Vas-y)!"), Some("Go (Vas-y)!".to_string()));
        assert_eq!(detect_correction("Bonjour!"), None);
        assert_eq!(detect_correction("only open ("), None);
        assert_eq!(detect_correction(") only close"), None);
    }
}
