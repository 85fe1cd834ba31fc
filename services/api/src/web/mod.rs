pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the binary can build the router without
// reaching into submodules.
pub use rest::{
    close_conversation_handler, create_worksheet_handler, evaluate_answer_handler,
    get_transcript_handler, get_worksheet_handler, list_conversations_handler,
    list_lessons_handler, preview_worksheet_handler, start_conversation_handler,
    submit_message_handler,
};
pub use ws_handler::ws_handler;
