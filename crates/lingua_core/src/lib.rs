pub mod domain;
pub mod ports;
pub mod prompt;

pub use domain::{
    Attempt, Conversation, ConversationSummary, Evaluation, Exercise, ExerciseKind, Learner,
    Lesson, LessonSummary, NewAttempt, Turn, TurnRole, VocabItem, Worksheet, WorksheetExercise,
};
pub use ports::{
    ChatCompletionService, ChatMessage, ChatRole, CompletionOptions, DatabaseService, Page,
    PortError, PortResult, SpeechToTextService, TextToSpeechService,
};
