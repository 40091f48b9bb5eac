//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Every user action of the story
//! workflow maps onto one request.

use crate::{
    error::{ErrorBody, WebError},
    web::{
        protocol::{
            ChapterDto, CreateSessionResponse, SavedStoryDetail, SavedStorySummary,
            SessionSnapshot, StoryRequest, StyleDto,
        },
        state::{AppState, SessionHandle},
        story_task,
    },
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use photo_story_core::{
    domain::{Mode, StoryStyle, UploadedImage},
    workflow::{Action, WorkflowError},
};
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_styles_handler,
        create_session_handler,
        get_session_handler,
        delete_session_handler,
        upload_images_handler,
        caption_handler,
        story_handler,
        title_handler,
        narration_handler,
        download_narration_handler,
        save_handler,
        list_stories_handler,
        view_story_handler,
        download_story_handler,
        story_image_handler,
        reset_handler,
        bgm_handler,
    ),
    components(
        schemas(
            StyleDto, CreateSessionResponse, SessionSnapshot, ChapterDto, StoryRequest,
            SavedStorySummary, SavedStoryDetail, ErrorBody
        )
    ),
    tags(
        (name = "Photo Story API", description = "Turn uploaded photos into captions, stories and narration.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

async fn snapshot(session_id: Uuid, session_lock: &SessionHandle) -> Json<SessionSnapshot> {
    let session = session_lock.lock().await;
    Json(SessionSnapshot::capture(session_id, &session))
}

fn attachment(file_name: &str) -> String {
    format!("attachment; filename=\"{}\"", file_name)
}

//=========================================================================================
// Styles and Sessions
//=========================================================================================

/// List the story style presets.
#[utoipa::path(
    get,
    path = "/styles",
    responses((status = 200, description = "All presets, default first", body = [StyleDto]))
)]
pub async fn list_styles_handler() -> Json<Vec<StyleDto>> {
    Json(StoryStyle::ALL.into_iter().map(StyleDto::from).collect())
}

/// Start a new session initialized with defaults.
#[utoipa::path(
    post,
    path = "/sessions",
    responses((status = 201, description = "Session created", body = CreateSessionResponse))
)]
pub async fn create_session_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let (session_id, handle) = app_state.sessions.create().await;
    let upload_generation = handle.lock().await.upload_generation;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            upload_generation,
        }),
    )
}

/// Get the current state of a session.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;
    Ok(snapshot(session_id, &handle).await)
}

/// End a session and discard everything it holds.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "Unknown session", body = ErrorBody)
    )
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, WebError> {
    if app_state.sessions.remove(session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::SessionNotFound(session_id))
    }
}

//=========================================================================================
// Create Workflow
//=========================================================================================

/// Upload one or more photos, replacing any earlier upload.
///
/// Accepts a multipart/form-data request; every part with a body is treated as
/// an image. Only JPEG and PNG are accepted.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/images",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    request_body(content_type = "multipart/form-data", description = "The images to upload."),
    responses(
        (status = 200, description = "Images stored", body = SessionSnapshot),
        (status = 400, description = "No images or too many images", body = ErrorBody),
        (status = 415, description = "Not a JPEG or PNG", body = ErrorBody)
    )
)]
pub async fn upload_images_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;

    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let file_name = field
            .file_name()
            .or_else(|| field.name())
            .unwrap_or("image")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| WebError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        if data.is_empty() {
            continue;
        }
        let image = UploadedImage::from_upload(file_name.clone(), data)
            .ok_or(WorkflowError::UnsupportedImage(file_name))?;
        images.push(image);
    }

    if images.is_empty() {
        return Err(WebError::BadRequest(
            "Upload at least one JPEG or PNG image".to_string(),
        ));
    }
    let count = images.len();
    handle.lock().await.apply(Action::UploadImages(images))?;
    info!(%session_id, "Uploaded {} image(s)", count);
    Ok(snapshot(session_id, &handle).await)
}

/// Generate a caption for each uploaded image.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/caption",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Captions generated", body = SessionSnapshot),
        (status = 409, description = "No image uploaded", body = ErrorBody),
        (status = 502, description = "The model failed", body = ErrorBody),
        (status = 504, description = "The model timed out", body = ErrorBody)
    )
)]
pub async fn caption_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;
    story_task::generate_caption(&app_state, &handle).await?;
    Ok(snapshot(session_id, &handle).await)
}

/// Expand the caption into a story in the chosen style.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/story",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    request_body = StoryRequest,
    responses(
        (status = 200, description = "Story generated", body = SessionSnapshot),
        (status = 400, description = "Unknown style", body = ErrorBody),
        (status = 409, description = "No caption yet", body = ErrorBody),
        (status = 502, description = "The model failed", body = ErrorBody)
    )
)]
pub async fn story_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<StoryRequest>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let style = match request.style.as_deref() {
        None => StoryStyle::default(),
        Some(id) => StoryStyle::from_id(id)
            .ok_or_else(|| WebError::BadRequest(format!("Unknown style '{}'", id)))?,
    };
    let handle = app_state.session(session_id).await?;
    story_task::generate_story(&app_state, &handle, style).await?;
    Ok(snapshot(session_id, &handle).await)
}

/// Generate a short title for the current story.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/title",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Title generated", body = SessionSnapshot),
        (status = 409, description = "No story yet", body = ErrorBody),
        (status = 502, description = "The model failed", body = ErrorBody)
    )
)]
pub async fn title_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;
    story_task::generate_title(&app_state, &handle).await?;
    Ok(snapshot(session_id, &handle).await)
}

/// Synthesize narration audio for the current story.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/narration",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Narration generated", body = SessionSnapshot),
        (status = 409, description = "No story yet", body = ErrorBody),
        (status = 502, description = "Speech synthesis failed", body = ErrorBody),
        (status = 503, description = "Narration is not configured", body = ErrorBody)
    )
)]
pub async fn narration_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;
    story_task::generate_narration(&app_state, &handle).await?;
    Ok(snapshot(session_id, &handle).await)
}

/// Download the generated narration as MP3.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/narration",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "MP3 audio (audio/mpeg)"),
        (status = 404, description = "No narration generated", body = ErrorBody)
    )
)]
pub async fn download_narration_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, WebError> {
    let handle = app_state.session(session_id).await?;
    let audio = handle
        .lock()
        .await
        .draft
        .narration
        .clone()
        .ok_or_else(|| WebError::NotFound("No narration has been generated".to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_DISPOSITION, attachment("narration.mp3")),
        ],
        audio,
    ))
}

/// Save the current story to the session's shelf.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/save",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 201, description = "Story saved", body = SavedStorySummary),
        (status = 409, description = "No story to save", body = ErrorBody)
    )
)]
pub async fn save_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, WebError> {
    let handle = app_state.session(session_id).await?;
    let mut session = handle.lock().await;
    session.apply(Action::Save {
        id: Uuid::new_v4(),
        at: Utc::now(),
    })?;
    let saved = session
        .shelf
        .last_saved()
        .map(SavedStorySummary::from)
        .ok_or_else(|| WebError::Internal("Saved story is missing from the shelf".to_string()))?;
    info!(%session_id, story_id = %saved.id, "Story saved");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Return to create mode with a fresh draft.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/reset",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses((status = 200, description = "Draft cleared", body = SessionSnapshot))
)]
pub async fn reset_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, WebError> {
    let handle = app_state.session(session_id).await?;
    handle.lock().await.apply(Action::ReturnToCreate)?;
    Ok(snapshot(session_id, &handle).await)
}

/// Fetch the background music matching the active style.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/bgm",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses(
        (status = 200, description = "MP3 audio (audio/mpeg)"),
        (status = 404, description = "No track for this style", body = ErrorBody)
    )
)]
pub async fn bgm_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, WebError> {
    let handle = app_state.session(session_id).await?;
    let style = {
        let session = handle.lock().await;
        let viewed = match session.mode {
            Mode::View(id) => session.shelf.get(id).map(|s| s.style),
            Mode::Create => None,
        };
        viewed.unwrap_or(session.draft.style)
    };

    let path = app_state.config.bgm_dir.join(style.bgm_file());
    let audio = tokio::fs::read(&path).await.map_err(|_| {
        WebError::NotFound("Background music is not available right now".to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

//=========================================================================================
// Saved Stories
//=========================================================================================

/// List the stories saved in this session.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/stories",
    params(("session_id" = Uuid, Path, description = "The session id.")),
    responses((status = 200, description = "Saved stories in save order", body = [SavedStorySummary]))
)]
pub async fn list_stories_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<SavedStorySummary>>, WebError> {
    let handle = app_state.session(session_id).await?;
    let session = handle.lock().await;
    Ok(Json(session.shelf.iter().map(SavedStorySummary::from).collect()))
}

/// Open a saved story, switching the session into view mode.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/stories/{story_id}/view",
    params(
        ("session_id" = Uuid, Path, description = "The session id."),
        ("story_id" = Uuid, Path, description = "The saved story id.")
    ),
    responses(
        (status = 200, description = "Now viewing the story", body = SavedStoryDetail),
        (status = 404, description = "Unknown story", body = ErrorBody)
    )
)]
pub async fn view_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, story_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SavedStoryDetail>, WebError> {
    let handle = app_state.session(session_id).await?;
    let mut session = handle.lock().await;
    session.apply(Action::SelectSaved(story_id))?;
    let story = session
        .shelf
        .get(story_id)
        .ok_or(WorkflowError::UnknownStory(story_id))?;
    Ok(Json(SavedStoryDetail::from(story)))
}

/// Download a saved story as plain text.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/stories/{story_id}/download",
    params(
        ("session_id" = Uuid, Path, description = "The session id."),
        ("story_id" = Uuid, Path, description = "The saved story id.")
    ),
    responses(
        (status = 200, description = "The story text (text/plain)"),
        (status = 404, description = "Unknown story", body = ErrorBody)
    )
)]
pub async fn download_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, story_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, WebError> {
    let handle = app_state.session(session_id).await?;
    let session = handle.lock().await;
    let story = session
        .shelf
        .get(story_id)
        .ok_or(WorkflowError::UnknownStory(story_id))?;
    let body = format!("{}\n\n{}\n", story.title, story.story);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment(&format!("story-{}.txt", story.id)),
            ),
        ],
        body,
    ))
}

/// Fetch the photo a saved story was generated from.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/stories/{story_id}/image",
    params(
        ("session_id" = Uuid, Path, description = "The session id."),
        ("story_id" = Uuid, Path, description = "The saved story id.")
    ),
    responses(
        (status = 200, description = "The source image"),
        (status = 404, description = "Unknown story or no image", body = ErrorBody)
    )
)]
pub async fn story_image_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, story_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, WebError> {
    let handle = app_state.session(session_id).await?;
    let session = handle.lock().await;
    let image = session
        .shelf
        .get(story_id)
        .ok_or(WorkflowError::UnknownStory(story_id))?
        .image
        .clone()
        .ok_or_else(|| WebError::NotFound("This story has no image".to_string()))?;
    Ok(([(header::CONTENT_TYPE, image.media_type.mime())], image.data))
}
