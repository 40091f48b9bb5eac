//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use chrono::{DateTime, Utc};
use photo_story_core::{
    domain::{Chapter, CreateStage, Mode, SavedStory, StoryStyle},
    workflow::StorySession,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client TO the Server
//=========================================================================================

/// Chooses the tone preset for story generation. Omitting it selects the default preset.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct StoryRequest {
    pub style: Option<String>,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StyleDto {
    pub id: String,
    pub label: String,
    pub tone: String,
}

impl From<StoryStyle> for StyleDto {
    fn from(style: StoryStyle) -> Self {
        Self {
            id: style.id().to_string(),
            label: style.label().to_string(),
            tone: style.tone().to_string(),
        }
    }
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub upload_generation: u64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, ToSchema)]
pub struct ChapterDto {
    pub label: Option<String>,
    pub body: String,
}

impl From<&Chapter> for ChapterDto {
    fn from(chapter: &Chapter) -> Self {
        Self {
            label: chapter.label.clone(),
            body: chapter.body.clone(),
        }
    }
}

/// Everything a client needs to render the current state of a session.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    /// `create` or `view`.
    pub mode: String,
    /// The saved story being viewed, in view mode.
    pub viewing: Option<Uuid>,
    /// `empty`, `image_loaded`, `captioned`, `storied` or `saved`.
    pub stage: String,
    pub style: String,
    pub image_count: usize,
    pub captions: Vec<String>,
    pub story: Option<String>,
    pub title: Option<String>,
    pub chapters: Vec<ChapterDto>,
    pub saved: bool,
    pub has_narration: bool,
    /// Changes whenever the upload control should be rendered fresh.
    pub upload_generation: u64,
    pub saved_count: usize,
}

fn stage_name(stage: CreateStage) -> &'static str {
    match stage {
        CreateStage::Empty => "empty",
        CreateStage::ImageLoaded => "image_loaded",
        CreateStage::Captioned => "captioned",
        CreateStage::Storied => "storied",
        CreateStage::Saved => "saved",
    }
}

impl SessionSnapshot {
    pub fn capture(session_id: Uuid, session: &StorySession) -> Self {
        let draft = &session.draft;
        let (mode, viewing) = match session.mode {
            Mode::Create => ("create", None),
            Mode::View(id) => ("view", Some(id)),
        };
        Self {
            session_id,
            mode: mode.to_string(),
            viewing,
            stage: stage_name(session.stage()).to_string(),
            style: draft.style.id().to_string(),
            image_count: draft.images.len(),
            captions: draft.captions.clone(),
            story: draft.story.clone(),
            title: draft.title.clone(),
            chapters: draft.chapters.iter().map(ChapterDto::from).collect(),
            saved: draft.saved,
            has_narration: draft.narration.is_some(),
            upload_generation: session.upload_generation,
            saved_count: session.shelf.len(),
        }
    }
}

/// A saved story as listed on the shelf.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SavedStorySummary {
    pub id: Uuid,
    pub title: String,
    pub style: String,
    pub created_at: DateTime<Utc>,
}

impl From<&SavedStory> for SavedStorySummary {
    fn from(story: &SavedStory) -> Self {
        Self {
            id: story.id,
            title: story.title.clone(),
            style: story.style.id().to_string(),
            created_at: story.created_at,
        }
    }
}

/// A saved story opened in view mode.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SavedStoryDetail {
    pub id: Uuid,
    pub title: String,
    pub story: String,
    pub style: String,
    pub has_image: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&SavedStory> for SavedStoryDetail {
    fn from(story: &SavedStory) -> Self {
        Self {
            id: story.id,
            title: story.title.clone(),
            story: story.story.clone(),
            style: story.style.id().to_string(),
            has_image: story.image.is_some(),
            created_at: story.created_at,
        }
    }
}
