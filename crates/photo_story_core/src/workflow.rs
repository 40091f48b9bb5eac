//! crates/photo_story_core/src/workflow.rs
//!
//! The story workflow state machine. Every user action is an [`Action`] applied
//! to a [`StorySession`]; external calls happen outside of this module and feed
//! their results back in as actions.

use crate::{
    domain::{Chapter, CreateStage, Mode, SavedStory, StoryStyle, UploadedImage},
    shelf::{KeyPolicy, StoryShelf},
    story_text::{extract_title, fallback_title, split_chapters},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Upper bound on images per story unless configured otherwise.
pub const DEFAULT_MAX_IMAGES: usize = 5;

//=========================================================================================
// Errors
//=========================================================================================

/// Reasons an action is rejected. A rejected action never modifies the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("This action is only available while creating a story")]
    WrongMode,
    #[error("Upload an image first")]
    MissingImage,
    #[error("Generate a caption first")]
    MissingCaption,
    #[error("Generate a story first")]
    MissingStory,
    #[error("Unsupported image '{0}': only JPEG and PNG are accepted")]
    UnsupportedImage(String),
    #[error("Too many images: at most {0} can be uploaded")]
    TooManyImages(usize),
    #[error("The model returned no usable {0}")]
    EmptyOutput(&'static str),
    #[error("No saved story with id {0}")]
    UnknownStory(Uuid),
    #[error("The story changed while the request was running; please try again")]
    Stale,
}

//=========================================================================================
// Session State
//=========================================================================================

/// The story being built in create mode.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub images: Vec<UploadedImage>,
    pub captions: Vec<String>,
    pub style: StoryStyle,
    pub story: Option<String>,
    pub title: Option<String>,
    pub chapters: Vec<Chapter>,
    pub narration: Option<Bytes>,
    pub saved: bool,
}

impl Draft {
    fn clear_after_images(&mut self) {
        self.captions.clear();
        self.clear_after_captions();
    }

    fn clear_after_captions(&mut self) {
        self.story = None;
        self.clear_after_story();
    }

    fn clear_after_story(&mut self) {
        self.title = None;
        self.chapters.clear();
        self.narration = None;
        self.saved = false;
    }
}

/// Everything one interactive session holds.
#[derive(Debug, Clone)]
pub struct StorySession {
    pub mode: Mode,
    pub draft: Draft,
    pub shelf: StoryShelf,
    /// Changes whenever the upload control must be presented fresh.
    pub upload_generation: u64,
    revision: u64,
    max_images: usize,
}

impl Default for StorySession {
    fn default() -> Self {
        Self::new(KeyPolicy::default(), DEFAULT_MAX_IMAGES)
    }
}

/// A user action or the result of an external call.
#[derive(Debug, Clone)]
pub enum Action {
    UploadImages(Vec<UploadedImage>),
    /// One caption per uploaded image, in upload order.
    CaptionGenerated(Vec<String>),
    StoryGenerated { style: StoryStyle, text: String },
    /// Raw model response; the title is extracted from it.
    TitleGenerated(String),
    NarrationGenerated(Bytes),
    Save { id: Uuid, at: DateTime<Utc> },
    SelectSaved(Uuid),
    ReturnToCreate,
}

impl StorySession {
    pub fn new(policy: KeyPolicy, max_images: usize) -> Self {
        Self {
            mode: Mode::Create,
            draft: Draft::default(),
            shelf: StoryShelf::with_policy(policy),
            upload_generation: 0,
            revision: 0,
            max_images,
        }
    }

    pub fn stage(&self) -> CreateStage {
        let draft = &self.draft;
        if draft.saved {
            CreateStage::Saved
        } else if draft.story.is_some() {
            CreateStage::Storied
        } else if !draft.captions.is_empty() {
            CreateStage::Captioned
        } else if !draft.images.is_empty() {
            CreateStage::ImageLoaded
        } else {
            CreateStage::Empty
        }
    }

    /// Identifies the inputs an external call is derived from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rejects a result computed against an older revision.
    pub fn ensure_revision(&self, expected: u64) -> Result<(), WorkflowError> {
        if self.revision == expected {
            Ok(())
        } else {
            Err(WorkflowError::Stale)
        }
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    fn require_create_mode(&self) -> Result<(), WorkflowError> {
        match self.mode {
            Mode::Create => Ok(()),
            Mode::View(_) => Err(WorkflowError::WrongMode),
        }
    }

    /// The images to caption.
    pub fn require_images(&self) -> Result<&[UploadedImage], WorkflowError> {
        self.require_create_mode()?;
        if self.draft.images.is_empty() {
            return Err(WorkflowError::MissingImage);
        }
        Ok(&self.draft.images)
    }

    /// The captions a story is generated from.
    pub fn require_captions(&self) -> Result<&[String], WorkflowError> {
        self.require_create_mode()?;
        if self.draft.captions.is_empty() {
            return Err(WorkflowError::MissingCaption);
        }
        Ok(&self.draft.captions)
    }

    /// The current story text.
    pub fn require_story(&self) -> Result<&str, WorkflowError> {
        self.require_create_mode()?;
        match self.draft.story.as_deref() {
            Some(story) if !story.trim().is_empty() => Ok(story),
            _ => Err(WorkflowError::MissingStory),
        }
    }

    /// Applies an action. On error the session is left exactly as it was.
    pub fn apply(&mut self, action: Action) -> Result<(), WorkflowError> {
        match action {
            Action::UploadImages(images) => {
                self.require_create_mode()?;
                if images.is_empty() {
                    return Err(WorkflowError::MissingImage);
                }
                if images.len() > self.max_images {
                    return Err(WorkflowError::TooManyImages(self.max_images));
                }
                self.draft.images = images;
                self.draft.clear_after_images();
                self.revision += 1;
            }
            Action::CaptionGenerated(captions) => {
                let expected = self.require_images()?.len();
                let captions: Vec<String> =
                    captions.iter().map(|c| c.trim().to_string()).collect();
                if captions.len() != expected || captions.iter().any(String::is_empty) {
                    return Err(WorkflowError::EmptyOutput("caption"));
                }
                self.draft.captions = captions;
                self.draft.clear_after_captions();
                self.revision += 1;
            }
            Action::StoryGenerated { style, text } => {
                self.require_captions()?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(WorkflowError::EmptyOutput("story"));
                }
                self.draft.clear_after_story();
                self.draft.chapters = split_chapters(text);
                self.draft.story = Some(text.to_string());
                self.draft.style = style;
                self.revision += 1;
            }
            Action::TitleGenerated(raw) => {
                self.require_story()?;
                let title = extract_title(&raw);
                if title.is_empty() {
                    return Err(WorkflowError::EmptyOutput("title"));
                }
                self.draft.title = Some(title);
            }
            Action::NarrationGenerated(audio) => {
                self.require_story()?;
                if audio.is_empty() {
                    return Err(WorkflowError::EmptyOutput("audio"));
                }
                self.draft.narration = Some(audio);
            }
            Action::Save { id, at } => {
                let story = self.require_story()?.to_string();
                let title = match &self.draft.title {
                    Some(title) => title.clone(),
                    None => fallback_title(&story),
                };
                self.shelf.insert(SavedStory {
                    id,
                    title,
                    story,
                    style: self.draft.style,
                    image: self.draft.images.first().cloned(),
                    created_at: at,
                });
                self.draft.saved = true;
            }
            Action::SelectSaved(id) => {
                if !self.shelf.contains(id) {
                    return Err(WorkflowError::UnknownStory(id));
                }
                self.mode = Mode::View(id);
            }
            Action::ReturnToCreate => {
                self.draft = Draft::default();
                self.mode = Mode::Create;
                self.upload_generation += 1;
                self.revision += 1;
            }
        }
        Ok(())
    }
}

/// The workflow as a pure function of state and action.
pub fn transition(mut state: StorySession, action: Action) -> Result<StorySession, WorkflowError> {
    state.apply(action)?;
    Ok(state)
}
