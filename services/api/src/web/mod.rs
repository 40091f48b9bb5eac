pub mod protocol;
pub mod rest;
pub mod state;
pub mod story_task;

use crate::error::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use rest::*;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Builds the API router for the given state.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let session_routes = Router::new()
        .route(
            "/sessions/{session_id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/{session_id}/images", post(upload_images_handler))
        .route("/sessions/{session_id}/caption", post(caption_handler))
        .route("/sessions/{session_id}/story", post(story_handler))
        .route("/sessions/{session_id}/title", post(title_handler))
        .route(
            "/sessions/{session_id}/narration",
            post(narration_handler).get(download_narration_handler),
        )
        .route("/sessions/{session_id}/save", post(save_handler))
        .route("/sessions/{session_id}/reset", post(reset_handler))
        .route("/sessions/{session_id}/bgm", get(bgm_handler))
        .route("/sessions/{session_id}/stories", get(list_stories_handler))
        .route(
            "/sessions/{session_id}/stories/{story_id}/view",
            post(view_story_handler),
        )
        .route(
            "/sessions/{session_id}/stories/{story_id}/download",
            get(download_story_handler),
        )
        .route(
            "/sessions/{session_id}/stories/{story_id}/image",
            get(story_image_handler),
        );

    let max_upload_bytes = app_state.config.max_upload_bytes;
    Ok(Router::new()
        .route("/styles", get(list_styles_handler))
        .route("/sessions", post(create_session_handler))
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(app_state))
}

#[cfg(test)]
mod tests;
