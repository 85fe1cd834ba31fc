pub mod db;
pub mod llm;
pub mod stt;
pub mod tts;

pub use db::DbAdapter;
pub use llm::OpenAiChatAdapter;
pub use stt::OpenAiSttAdapter;
pub use tts::OpenAiTtsAdapter;
