use super::*;
use crate::{
    config::Config,
    web::protocol::{
        CreateSessionResponse, SavedStoryDetail, SavedStorySummary, SessionSnapshot, StyleDto,
    },
};
use async_trait::async_trait;
use axum::{
    body::{self, Body, Bytes},
    http::{Request, StatusCode},
};
use photo_story_core::{
    domain::UploadedImage,
    ports::{GenerativeModelService, PortError, PortResult, TextToSpeechService},
    prompts::CAPTION_PROMPT,
};
use serde::de::DeserializeOwned;
use std::{collections::VecDeque, sync::Mutex, time::Duration};
use tower::ServiceExt;
use uuid::Uuid;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
const BOUNDARY: &str = "photo-story-boundary";

//=========================================================================================
// Scripted Ports
//=========================================================================================

#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<PortResult<String>>>,
    prompts: Mutex<Vec<(String, usize)>>,
}

impl ScriptedModel {
    fn reply(self: &Arc<Self>, text: &str) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self.clone()
    }

    fn fail(self: &Arc<Self>) -> Arc<Self> {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(PortError::Unexpected("model exploded".to_string())));
        self.clone()
    }

    fn calls(&self) -> Vec<(String, usize)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModelService for ScriptedModel {
    async fn generate(&self, prompt: &str, images: &[UploadedImage]) -> PortResult<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), images.len()));
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Err(PortError::Unexpected("no scripted reply".to_string())))
    }
}

struct SlowModel;

#[async_trait]
impl GenerativeModelService for SlowModel {
    async fn generate(&self, _prompt: &str, _images: &[UploadedImage]) -> PortResult<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

#[derive(Default)]
struct ScriptedTts {
    replies: Mutex<VecDeque<PortResult<Vec<u8>>>>,
    languages: Mutex<Vec<String>>,
}

impl ScriptedTts {
    fn with(replies: Vec<PortResult<Vec<u8>>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            languages: Mutex::default(),
        })
    }
}

#[async_trait]
impl TextToSpeechService for ScriptedTts {
    async fn generate_audio(&self, _text: &str, language: &str) -> PortResult<Vec<u8>> {
        self.languages.lock().unwrap().push(language.to_string());
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Err(PortError::Unexpected("speech engine down".to_string())))
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn test_app_with(
    config: Config,
    model: Arc<dyn GenerativeModelService>,
    tts: Arc<dyn TextToSpeechService>,
) -> Router {
    let app_state = Arc::new(AppState::new(Arc::new(config), model, tts));
    build_router(app_state).expect("router")
}

fn test_app(model: Arc<ScriptedModel>, tts: Arc<ScriptedTts>) -> Router {
    test_app_with(Config::for_tests(), model, tts)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, body)
}

async fn send_json<T: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, T) {
    let (status, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!("invalid json ({}): {}", e, String::from_utf8_lossy(&body))
    });
    (status, value)
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn post_json(uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

fn upload(session_id: Uuid, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(format!("/sessions/{session_id}/images"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn new_session(app: &Router) -> Uuid {
    let (status, created): (_, CreateSessionResponse) = send_json(app, post("/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    created.session_id
}

async fn snapshot(app: &Router, session_id: Uuid) -> SessionSnapshot {
    let (status, snapshot) = send_json(app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    snapshot
}

/// Drives a session up to a generated story.
async fn storied_session(app: &Router) -> Uuid {
    let session_id = new_session(app).await;
    let (status, _) = send(app, upload(session_id, &[("port.jpg", JPEG)])).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        app,
        post_json(
            &format!("/sessions/{session_id}/story"),
            serde_json::json!({ "style": "romantic" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session_id
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn styles_lists_all_seven_presets() {
    let app = test_app(Arc::default(), Arc::default());
    let (status, styles): (_, Vec<StyleDto>) = send_json(&app, get("/styles")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(styles.len(), 7);
    assert_eq!(styles[0].id, "novel");
    assert_eq!(styles[0].label, "小説風（デフォルト）");
}

#[tokio::test]
async fn full_create_save_view_flow() {
    let model = Arc::new(ScriptedModel::default())
        .reply("夕暮れの港に、灯がひとつ揺れていた。")
        .reply("港に灯がともる。二人は約束を交わした。")
        .reply("1. 星空の約束\n2. 港の灯\n3. 夜の舟");
    let app = test_app(model.clone(), Arc::default());
    let session_id = new_session(&app).await;

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, upload(session_id, &[("port.jpg", JPEG)])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.stage, "image_loaded");
    assert_eq!(snap.image_count, 1);

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.stage, "captioned");
    assert_eq!(snap.captions, vec!["夕暮れの港に、灯がひとつ揺れていた。"]);

    let (status, snap): (_, SessionSnapshot) = send_json(
        &app,
        post_json(
            &format!("/sessions/{session_id}/story"),
            serde_json::json!({ "style": "romantic" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.stage, "storied");
    assert_eq!(snap.style, "romantic");
    assert!(!snap.saved);
    assert_eq!(snap.chapters.len(), 1);
    assert_eq!(snap.chapters[0].label, None);

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/title"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.title.as_deref(), Some("星空の約束"));

    let (status, saved): (_, SavedStorySummary) =
        send_json(&app, post(&format!("/sessions/{session_id}/save"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(saved.title, "星空の約束");
    assert!(snapshot(&app, session_id).await.saved);

    let (status, detail): (_, SavedStoryDetail) = send_json(
        &app,
        post(&format!("/sessions/{session_id}/stories/{}/view", saved.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail.story, "港に灯がともる。二人は約束を交わした。");
    assert!(detail.has_image);
    let snap = snapshot(&app, session_id).await;
    assert_eq!(snap.mode, "view");
    assert_eq!(snap.viewing, Some(saved.id));

    let (status, text) = send(
        &app,
        get(&format!("/sessions/{session_id}/stories/{}/download", saved.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&text).starts_with("星空の約束\n\n港に灯がともる。"));

    let (status, image) = send(
        &app,
        get(&format!("/sessions/{session_id}/stories/{}/image", saved.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(image.as_ref(), JPEG);

    let caption_calls: Vec<_> = model
        .calls()
        .into_iter()
        .filter(|(prompt, _)| prompt == CAPTION_PROMPT)
        .collect();
    assert_eq!(caption_calls, vec![(CAPTION_PROMPT.to_string(), 1)]);
}

#[tokio::test]
async fn story_before_caption_is_rejected_without_calling_the_model() {
    let model = Arc::new(ScriptedModel::default());
    let app = test_app(model.clone(), Arc::default());
    let session_id = new_session(&app).await;
    send(&app, upload(session_id, &[("a.png", PNG)])).await;

    let (status, body) = send(
        &app,
        post_json(&format!("/sessions/{session_id}/story"), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(String::from_utf8_lossy(&body).contains("caption"));
    assert!(model.calls().is_empty());
    assert_eq!(snapshot(&app, session_id).await.stage, "image_loaded");
}

#[tokio::test]
async fn caption_failure_keeps_prior_state_and_can_be_retried() {
    let model = Arc::new(ScriptedModel::default())
        .fail()
        .reply("森の奥で光がこぼれる。");
    let app = test_app(model, Arc::default());
    let session_id = new_session(&app).await;
    send(&app, upload(session_id, &[("forest.jpg", JPEG)])).await;

    let (status, _) = send(&app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let snap = snapshot(&app, session_id).await;
    assert_eq!(snap.stage, "image_loaded");
    assert!(snap.captions.is_empty());

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.captions, vec!["森の奥で光がこぼれる。"]);
}

#[tokio::test]
async fn rejects_non_jpeg_png_uploads_and_empty_forms() {
    let app = test_app(Arc::default(), Arc::default());
    let session_id = new_session(&app).await;

    let (status, _) = send(&app, upload(session_id, &[("anim.gif", b"GIF89a....")])).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let (status, _) = send(&app, upload(session_id, &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(snapshot(&app, session_id).await.stage, "empty");
}

#[tokio::test]
async fn multiple_images_produce_chapters() {
    let model = Arc::new(ScriptedModel::default())
        .reply("朝の森。")
        .reply("夜の湖。")
        .reply("第1章 はじまり\n森で目を覚ました。\n第2章 旅立ち\n湖へ向かった。");
    let app = test_app(model.clone(), Arc::default());
    let session_id = new_session(&app).await;

    send(&app, upload(session_id, &[("a.jpg", JPEG), ("b.png", PNG)])).await;
    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.captions.len(), 2);

    let (status, snap): (_, SessionSnapshot) = send_json(
        &app,
        post_json(
            &format!("/sessions/{session_id}/story"),
            serde_json::json!({ "style": "adventure" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let labels: Vec<_> = snap.chapters.iter().map(|c| c.label.clone()).collect();
    assert_eq!(labels, vec![Some("1章".to_string()), Some("2章".to_string())]);
    assert_eq!(snap.chapters[1].body, "旅立ち\n湖へ向かった。");

    let (story_prompt, image_count) = model.calls().last().cloned().expect("story call");
    assert_eq!(image_count, 0);
    assert!(story_prompt.contains("全2章"));
}

#[tokio::test]
async fn too_many_images_are_rejected() {
    let mut config = Config::for_tests();
    config.max_images = 1;
    let app = test_app_with(
        config,
        Arc::new(ScriptedModel::default()),
        Arc::new(ScriptedTts::default()),
    );
    let session_id = new_session(&app).await;
    let (status, _) = send(&app, upload(session_id, &[("a.jpg", JPEG), ("b.jpg", JPEG)])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_style_and_session_are_reported() {
    let app = test_app(Arc::default(), Arc::default());
    let session_id = new_session(&app).await;

    let (status, _) = send(
        &app,
        post_json(
            &format!("/sessions/{session_id}/story"),
            serde_json::json!({ "style": "western" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get(&format!("/sessions/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Request::delete(format!("/sessions/{session_id}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, get(&format!("/sessions/{session_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn saving_twice_creates_two_records_in_one_click_each() {
    let model = Arc::new(ScriptedModel::default())
        .reply("港。")
        .reply("灯がともる。");
    let app = test_app(model, Arc::default());
    let session_id = storied_session(&app).await;

    let (first, a): (_, SavedStorySummary) =
        send_json(&app, post(&format!("/sessions/{session_id}/save"))).await;
    let (second, b): (_, SavedStorySummary) =
        send_json(&app, post(&format!("/sessions/{session_id}/save"))).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CREATED);
    assert_ne!(a.id, b.id);
    assert_eq!(a.title, b.title);

    let (_, stories): (_, Vec<SavedStorySummary>) =
        send_json(&app, get(&format!("/sessions/{session_id}/stories"))).await;
    assert_eq!(stories.len(), 2);
}

#[tokio::test]
async fn save_without_story_is_rejected() {
    let app = test_app(Arc::default(), Arc::default());
    let session_id = new_session(&app).await;
    let (status, _) = send(&app, post(&format!("/sessions/{session_id}/save"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reset_clears_the_draft_and_refreshes_the_upload_control() {
    let model = Arc::new(ScriptedModel::default())
        .reply("港。")
        .reply("灯がともる。");
    let app = test_app(model, Arc::default());
    let session_id = storied_session(&app).await;
    send(&app, post(&format!("/sessions/{session_id}/save"))).await;
    let before = snapshot(&app, session_id).await;

    let (status, after): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/reset"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after.mode, "create");
    assert_eq!(after.stage, "empty");
    assert!(after.captions.is_empty());
    assert!(after.story.is_none());
    assert!(after.title.is_none());
    assert!(!after.saved);
    assert_ne!(after.upload_generation, before.upload_generation);
    assert_eq!(after.saved_count, 1);

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, upload(session_id, &[("port.jpg", JPEG)])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap.stage, "image_loaded");
}

#[tokio::test]
async fn failed_narration_keeps_previous_audio_and_story() {
    let model = Arc::new(ScriptedModel::default())
        .reply("港。")
        .reply("灯がともる。");
    let tts = ScriptedTts::with(vec![
        Ok(b"ID3-first".to_vec()),
        Err(PortError::Unexpected("speech engine down".to_string())),
    ]);
    let app = test_app(model, tts.clone());
    let session_id = storied_session(&app).await;

    let (status, snap): (_, SessionSnapshot) =
        send_json(&app, post(&format!("/sessions/{session_id}/narration"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(snap.has_narration);

    let (status, body) = send(&app, post(&format!("/sessions/{session_id}/narration"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8_lossy(&body).contains("speech engine down"));

    let (status, audio) = send(&app, get(&format!("/sessions/{session_id}/narration"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audio.as_ref(), b"ID3-first");
    assert_eq!(
        snapshot(&app, session_id).await.story.as_deref(),
        Some("灯がともる。")
    );
    assert_eq!(*tts.languages.lock().unwrap(), vec!["ja", "ja"]);
}

#[tokio::test]
async fn narration_download_before_generation_is_not_found() {
    let app = test_app(Arc::default(), Arc::default());
    let session_id = new_session(&app).await;
    let (status, _) = send(&app, get(&format!("/sessions/{session_id}/narration"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unconfigured_narration_is_unavailable() {
    let model = Arc::new(ScriptedModel::default())
        .reply("港。")
        .reply("灯がともる。");
    let app = test_app_with(
        Config::for_tests(),
        model,
        Arc::new(crate::adapters::UnavailableTtsAdapter),
    );
    let session_id = storied_session(&app).await;
    let (status, _) = send(&app, post(&format!("/sessions/{session_id}/narration"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn slow_model_times_out() {
    let mut config = Config::for_tests();
    config.model_timeout = Duration::from_millis(50);
    let app = test_app_with(config, Arc::new(SlowModel), Arc::new(ScriptedTts::default()));
    let session_id = new_session(&app).await;
    send(&app, upload(session_id, &[("a.jpg", JPEG)])).await;

    let (status, _) = send(&app, post(&format!("/sessions/{session_id}/caption"))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(snapshot(&app, session_id).await.stage, "image_loaded");
}

#[tokio::test]
async fn bgm_is_served_when_the_track_exists() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("gentle.mp3"), b"ID3-gentle").expect("write");
    let mut config = Config::for_tests();
    config.bgm_dir = dir.path().to_path_buf();
    let model = Arc::new(ScriptedModel::default())
        .reply("港。")
        .reply("灯がともる。");
    let app = test_app_with(config, model, Arc::new(ScriptedTts::default()));

    let session_id = new_session(&app).await;
    let (status, track) = send(&app, get(&format!("/sessions/{session_id}/bgm"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(track.as_ref(), b"ID3-gentle");

    let (status, _) = send(
        &app,
        Request::delete(format!("/sessions/{session_id}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Romantic maps to romantic.mp3, which is missing.
    let session_id = storied_session(&app).await;
    let (status, _) = send(&app, get(&format!("/sessions/{session_id}/bgm"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
