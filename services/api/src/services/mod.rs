pub mod conversation;
pub mod evaluation;
pub mod worksheet;

pub use conversation::{ConversationService, TurnReply};
pub use evaluation::EvaluationService;
pub use worksheet::{WorksheetRequest, WorksheetService};

#[cfg(test)]
pub(crate) mod testing;
