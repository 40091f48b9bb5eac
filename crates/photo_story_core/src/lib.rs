pub mod domain;
pub mod ports;
pub mod prompts;
pub mod shelf;
pub mod story_text;
pub mod workflow;

pub use domain::{Chapter, CreateStage, MediaType, Mode, SavedStory, StoryStyle, UploadedImage};
pub use ports::{GenerativeModelService, PortError, PortResult, TextToSpeechService};
pub use shelf::{KeyPolicy, StoryShelf};
pub use workflow::{transition, Action, Draft, StorySession, WorkflowError};
