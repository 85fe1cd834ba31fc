//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::services::{ConversationService, EvaluationService, WorksheetService};
use lingua_core::ports::{DatabaseService, SpeechToTextService, TextToSpeechService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub stt_adapter: Arc<dyn SpeechToTextService>,
    pub tts_adapter: Arc<dyn TextToSpeechService>,
    pub conversations: ConversationService,
    pub worksheets: WorksheetService,
    pub evaluations: EvaluationService,
}
