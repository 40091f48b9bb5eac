//! crates/photo_story_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or serialization format,
//! apart from the serde names used for style identifiers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Style Presets
//=========================================================================================

/// One of the fixed tone presets supplied to the story generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStyle {
    #[default]
    Novel,
    PictureBook,
    DarkMystery,
    Adventure,
    Romantic,
    Comedy,
    Poem,
}

impl StoryStyle {
    /// Every preset, in the order they are offered to the user.
    pub const ALL: [StoryStyle; 7] = [
        StoryStyle::Novel,
        StoryStyle::PictureBook,
        StoryStyle::DarkMystery,
        StoryStyle::Adventure,
        StoryStyle::Romantic,
        StoryStyle::Comedy,
        StoryStyle::Poem,
    ];

    /// The stable identifier used on the wire.
    pub fn id(self) -> &'static str {
        match self {
            StoryStyle::Novel => "novel",
            StoryStyle::PictureBook => "picture_book",
            StoryStyle::DarkMystery => "dark_mystery",
            StoryStyle::Adventure => "adventure",
            StoryStyle::Romantic => "romantic",
            StoryStyle::Comedy => "comedy",
            StoryStyle::Poem => "poem",
        }
    }

    /// The display name shown in the style selector.
    pub fn label(self) -> &'static str {
        match self {
            StoryStyle::Novel => "小説風（デフォルト）",
            StoryStyle::PictureBook => "優しい絵本風",
            StoryStyle::DarkMystery => "ダーク・ミステリー風",
            StoryStyle::Adventure => "冒険物語",
            StoryStyle::Romantic => "ロマンチック",
            StoryStyle::Comedy => "コメディ調",
            StoryStyle::Poem => "ポエム（詩的）",
        }
    }

    /// The short tone instruction interpolated into the story prompt.
    pub fn tone(self) -> &'static str {
        match self {
            StoryStyle::Novel => "情緒的で文学的。一人称または三人称の自然な語り口。",
            StoryStyle::PictureBook => "幼い読者にも優しく語りかける、温かく柔らかい文体。",
            StoryStyle::DarkMystery => "不穏で謎めいた雰囲気。少し影のある語り口。",
            StoryStyle::Adventure => "ワクワクする展開、主人公の行動や発見を中心に。",
            StoryStyle::Romantic => "美しい情景と心情描写。柔らかいロマンチックな文体。",
            StoryStyle::Comedy => "ユーモアを交えた明るく楽しい語り口。",
            StoryStyle::Poem => "詩のようなリズムと比喩を多用した芸術的表現。",
        }
    }

    /// File name of the background track matching this preset.
    pub fn bgm_file(self) -> &'static str {
        match self {
            StoryStyle::Novel | StoryStyle::PictureBook => "gentle.mp3",
            StoryStyle::DarkMystery => "mystery.mp3",
            StoryStyle::Adventure => "adventure.mp3",
            StoryStyle::Romantic => "romantic.mp3",
            StoryStyle::Comedy => "funny.mp3",
            StoryStyle::Poem => "poem.mp3",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.id() == id)
    }
}

//=========================================================================================
// Uploaded Images
//=========================================================================================

/// The image formats accepted by the upload control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    /// Detects the format from the leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(MediaType::Jpeg)
        } else if data.starts_with(&PNG_SIGNATURE) {
            Some(MediaType::Png)
        } else {
            None
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }
}

/// A photo uploaded by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub file_name: String,
    pub media_type: MediaType,
    pub data: Bytes,
}

impl UploadedImage {
    /// Builds an image from raw upload bytes, rejecting anything that is not JPEG or PNG.
    pub fn from_upload(file_name: impl Into<String>, data: Bytes) -> Option<Self> {
        let media_type = MediaType::sniff(&data)?;
        Some(Self {
            file_name: file_name.into(),
            media_type,
            data,
        })
    }
}

//=========================================================================================
// Stories
//=========================================================================================

/// A section of a generated story. Unlabeled chapters come from text that
/// does not follow the heading convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub label: Option<String>,
    pub body: String,
}

/// A story the user explicitly saved during the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedStory {
    pub id: Uuid,
    pub title: String,
    pub story: String,
    pub style: StoryStyle,
    pub image: Option<UploadedImage>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Session Modes
//=========================================================================================

/// Whether the session is building a new story or viewing a saved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    View(Uuid),
}

/// Progress of the story being built in create mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreateStage {
    Empty,
    ImageLoaded,
    Captioned,
    Storied,
    Saved,
}
