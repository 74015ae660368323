//! Functional tests for backend selection and the server config snapshot

use axum::http::StatusCode;
use serde_json::json;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use crate::support::*;

#[tokio::test]
async fn test_current_model() {
    let app = test_app(settings()).await;

    let response = app.router.clone().oneshot(get("/api/v1/model")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "lama");
    assert_eq!(body["model_type"], "inpaint");
}

#[tokio::test]
async fn test_switch_to_active_model_does_not_load() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/model", json!({ "name": "lama" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "lama");
    assert_eq!(app.provider.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_switch_replaces_active_backend() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/model", json!({ "name": "mat" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "mat");
    assert_eq!(app.provider.loads.load(Ordering::SeqCst), 1);

    let current = body_json(app.router.clone().oneshot(get("/api/v1/model")).await.unwrap()).await;
    assert_eq!(current["name"], "mat");

    // The old backend no longer receives work
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/inpaint",
            json!({ "image": png_b64(4, 4), "mask": mask_b64(4, 4) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_switches_load_once() {
    let app = test_app(settings()).await;
    let backends = app.state.backends.clone();

    let (a, b) = tokio::join!(backends.switch("migan"), backends.switch("migan"));
    assert_eq!(a.unwrap().name, "migan");
    assert_eq!(b.unwrap().name, "migan");
    assert_eq!(app.provider.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_switch_to_unknown_model_keeps_current() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/model", json!({ "name": "nope" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "ModelNotFound");
    assert_eq!(app.state.backends.current_model().name, "lama");
}

#[tokio::test]
async fn test_server_config_snapshot() {
    let mut settings = settings();
    settings.model.disable_model_switch = true;
    let app = test_app(settings).await;

    let response = app.router.clone().oneshot(get("/api/v1/server-config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let config = body_json(response).await;

    let plugins: Vec<&str> = config["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(plugins, vec!["InteractiveSeg", "RealESRGAN", "RemoveBG"]);
    assert_eq!(config["plugins"][0]["support_gen_image"], false);
    assert_eq!(config["plugins"][0]["support_gen_mask"], true);

    assert_eq!(config["modelInfos"].as_array().unwrap().len(), 3);
    assert_eq!(config["removeBGModel"], "briaai/RMBG-1.4");
    assert_eq!(config["realesrganModel"], "realesr-general-x4v3");
    assert_eq!(config["interactiveSegModel"], "sam2_1_tiny");
    assert!(config["interactiveSegModels"].as_array().unwrap().len() > 1);
    assert_eq!(config["enableFileManager"], false);
    assert_eq!(config["enableAutoSaving"], false);
    assert_eq!(config["disableModelSwitch"], true);
    assert_eq!(config["enableControlnet"], false);
    assert!(config["controlnetMethod"].is_null());
    assert_eq!(config["isDesktop"], false);
    assert!(!config["samplers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_samplers_and_health() {
    let app = test_app(settings()).await;

    let samplers = body_json(app.router.clone().oneshot(get("/api/v1/samplers")).await.unwrap()).await;
    assert!(samplers.as_array().unwrap().iter().any(|s| s == "euler a"));

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
