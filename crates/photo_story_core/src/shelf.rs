//! crates/photo_story_core/src/shelf.rs
//!
//! The collection of stories saved within one session.

use crate::domain::SavedStory;
use uuid::Uuid;

/// How saved stories are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Every save creates a new record; titles are display-only and may repeat.
    #[default]
    ById,
    /// Legacy behaviour: a save whose title already exists overwrites that record.
    ByTitle,
}

#[derive(Debug, Clone, Default)]
pub struct StoryShelf {
    policy: KeyPolicy,
    stories: Vec<SavedStory>,
    last_saved: Option<Uuid>,
}

impl StoryShelf {
    pub fn with_policy(policy: KeyPolicy) -> Self {
        Self {
            policy,
            stories: Vec::new(),
            last_saved: None,
        }
    }

    /// Stores a record and returns the id it can be looked up by.
    pub fn insert(&mut self, story: SavedStory) -> Uuid {
        if self.policy == KeyPolicy::ByTitle {
            if let Some(existing) = self.stories.iter_mut().find(|s| s.title == story.title) {
                let id = existing.id;
                *existing = SavedStory { id, ..story };
                self.last_saved = Some(id);
                return id;
            }
        }
        let id = story.id;
        self.stories.push(story);
        self.last_saved = Some(id);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&SavedStory> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// The record written by the most recent save.
    pub fn last_saved(&self) -> Option<&SavedStory> {
        self.last_saved.and_then(|id| self.get(id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Saved stories in the order they were first saved.
    pub fn iter(&self) -> impl Iterator<Item = &SavedStory> {
        self.stories.iter()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}
