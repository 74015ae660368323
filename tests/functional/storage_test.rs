//! Functional tests for file-backed routes: save_image, inputimage and /output

use axum::http::StatusCode;
use inpaint_gateway::codec::ImageMetadata;
use tower::ServiceExt;

use crate::support::*;

#[tokio::test]
async fn test_save_image_strips_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.storage.output_dir = Some(dir.path().to_string_lossy().into_owned());
    let app = test_app(settings).await;

    let response = app
        .router
        .clone()
        .oneshot(post_file("/api/v1/save_image", "../../escape.png", b"pixels"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(std::fs::read(dir.path().join("escape.png")).unwrap(), b"pixels");
    assert!(!dir.path().parent().unwrap().join("escape.png").exists());
}

#[tokio::test]
async fn test_save_image_requires_existing_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.storage.output_dir = Some(dir.path().join("missing").to_string_lossy().into_owned());
    let app = test_app(settings).await;

    let response = app
        .router
        .clone()
        .oneshot(post_file("/api/v1/save_image", "a.png", b"pixels"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Unconfigured");
}

#[tokio::test]
async fn test_saved_files_are_served_under_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("done.png"), png(2, 2, 255, &ImageMetadata::new())).unwrap();
    let mut settings = settings();
    settings.storage.output_dir = Some(dir.path().to_string_lossy().into_owned());
    let app = test_app(settings).await;

    let response = app.router.clone().oneshot(get("/output/done.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_input_image_unconfigured_is_200() {
    let app = test_app(settings()).await;

    let response = app.router.clone().oneshot(get("/api/v1/inputimage")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"], "InputImageUnconfigured");
    assert_eq!(body["status_code"], 200);
}

#[tokio::test]
async fn test_input_image_missing_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.storage.input = Some(dir.path().join("gone.png").to_string_lossy().into_owned());
    let app = test_app(settings).await;

    let response = app.router.clone().oneshot(get("/api/v1/inputimage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_input_image_served() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.png");
    let data = png(3, 3, 255, &ImageMetadata::new());
    std::fs::write(&input, &data).unwrap();

    let mut settings = settings();
    settings.storage.input = Some(input.to_string_lossy().into_owned());
    let app = test_app(settings).await;

    let response = app.router.clone().oneshot(get("/api/v1/inputimage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(response).await, data);
}
