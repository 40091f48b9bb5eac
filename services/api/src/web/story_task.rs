//! services/api/src/web/story_task.rs
//!
//! The side-effecting steps of the story workflow. Each step snapshots its inputs
//! under the session lock, releases the lock for the external call, and applies
//! the result only if the session has not moved on in the meantime.

use crate::{
    error::WebError,
    web::state::{AppState, SessionHandle},
};
use bytes::Bytes;
use futures::future::try_join_all;
use photo_story_core::{
    domain::StoryStyle,
    ports::{PortError, PortResult},
    prompts::{story_prompt, title_prompt, CAPTION_PROMPT},
    workflow::Action,
};
use std::{future::Future, io::Write, slice, time::Duration, time::Instant};
use tracing::{error, info};

/// Runs one external call, bounded by the configured timeout. No retries.
async fn bounded<T>(timeout: Duration, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| PortError::Timeout)?
}

/// Applies the result of an external call if the inputs are still current.
async fn apply_result(
    session_lock: &SessionHandle,
    revision: u64,
    action: Action,
) -> Result<(), WebError> {
    let mut session = session_lock.lock().await;
    session.ensure_revision(revision)?;
    session.apply(action)?;
    Ok(())
}

/// Captions every uploaded image. Either all captions are stored or none.
pub async fn generate_caption(
    app_state: &AppState,
    session_lock: &SessionHandle,
) -> Result<(), WebError> {
    let (images, revision) = {
        let session = session_lock.lock().await;
        (session.require_images()?.to_vec(), session.revision())
    };

    let start = Instant::now();
    let model = &app_state.model_adapter;
    let calls = images
        .iter()
        .map(|image| model.generate(CAPTION_PROMPT, slice::from_ref(image)));
    let captions = bounded(app_state.config.model_timeout, try_join_all(calls))
        .await
        .inspect_err(|e| error!("Caption generation failed: {}", e))?;
    info!("⏱️ Captioned {} image(s) in {:?}", images.len(), start.elapsed());

    apply_result(session_lock, revision, Action::CaptionGenerated(captions)).await
}

/// Expands the captions into a story in the chosen style.
pub async fn generate_story(
    app_state: &AppState,
    session_lock: &SessionHandle,
    style: StoryStyle,
) -> Result<(), WebError> {
    let (prompt, revision) = {
        let session = session_lock.lock().await;
        (story_prompt(session.require_captions()?, style), session.revision())
    };

    let start = Instant::now();
    let text = bounded(
        app_state.config.model_timeout,
        app_state.model_adapter.generate(&prompt, &[]),
    )
    .await
    .inspect_err(|e| error!("Story generation failed: {}", e))?;
    info!(style = style.id(), "⏱️ Story generated in {:?}", start.elapsed());

    apply_result(session_lock, revision, Action::StoryGenerated { style, text }).await
}

pub async fn generate_title(
    app_state: &AppState,
    session_lock: &SessionHandle,
) -> Result<(), WebError> {
    let (prompt, revision) = {
        let session = session_lock.lock().await;
        (title_prompt(session.require_story()?), session.revision())
    };

    let raw = bounded(
        app_state.config.model_timeout,
        app_state.model_adapter.generate(&prompt, &[]),
    )
    .await
    .inspect_err(|e| error!("Title generation failed: {}", e))?;

    apply_result(session_lock, revision, Action::TitleGenerated(raw)).await
}

/// Synthesizes narration for the full story. On failure any earlier narration is kept.
pub async fn generate_narration(
    app_state: &AppState,
    session_lock: &SessionHandle,
) -> Result<(), WebError> {
    let (story, revision) = {
        let session = session_lock.lock().await;
        (session.require_story()?.to_string(), session.revision())
    };

    let start = Instant::now();
    let audio = bounded(
        app_state.config.model_timeout,
        app_state
            .tts_adapter
            .generate_audio(&story, &app_state.config.tts_language),
    )
    .await
    .inspect_err(|e| error!("Narration failed: {}", e))?;
    info!("⏱️ Narration synthesized in {:?}", start.elapsed());

    let audio = tokio::task::spawn_blocking(move || spool_audio(&audio))
        .await
        .map_err(|e| WebError::Internal(format!("Audio spooling task failed: {}", e)))??;

    apply_result(session_lock, revision, Action::NarrationGenerated(audio)).await
}

/// Writes the audio to a scoped temp file and reads it back. The file is
/// removed when it goes out of scope, whether or not the round trip succeeded.
fn spool_audio(audio: &[u8]) -> Result<Bytes, WebError> {
    let io_error = |e: std::io::Error| WebError::Internal(format!("Audio temp file: {}", e));

    let mut file = tempfile::Builder::new()
        .prefix("narration-")
        .suffix(".mp3")
        .tempfile()
        .map_err(io_error)?;
    file.write_all(audio).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    let spooled = std::fs::read(file.path()).map_err(io_error)?;
    Ok(Bytes::from(spooled))
}
