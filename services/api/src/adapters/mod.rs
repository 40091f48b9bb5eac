pub mod story_llm;
pub mod tts;

pub use story_llm::OpenAiStoryAdapter;
pub use tts::{OpenAiTtsAdapter, UnavailableTtsAdapter};
