//! Functional tests for plugin dispatch, mask adjustment and plugin model selection

use axum::http::StatusCode;
use image::Rgba;
use inpaint_gateway::codec::{base64, mask::BRUSH_COLOR, raster, ImageMetadata};
use inpaint_gateway::plugin::{Plugin, PluginKind};
use serde_json::json;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

use crate::support::*;

#[tokio::test]
async fn test_unknown_plugin_is_422() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_image",
            json!({ "name": "GFPGAN", "image": png_b64(4, 4) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "PluginNotFound");
}

#[tokio::test]
async fn test_capability_gate_runs_before_plugin() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_mask",
            json!({ "name": "RealESRGAN", "image": png_b64(4, 4) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "CapabilityUnsupported");
    assert_eq!(app.plugin(PluginKind::RealEsrgan).mask_calls.load(Ordering::SeqCst), 0);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_image",
            json!({ "name": "InteractiveSeg", "image": png_b64(4, 4) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.plugin(PluginKind::InteractiveSeg).image_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gen_image_reattaches_resized_alpha() {
    let app = test_app(settings()).await;
    let mut metadata = ImageMetadata::new();
    metadata.insert("parameters", "kept");
    let image = base64::encode(&png(4, 4, 60, &metadata));

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_image",
            json!({ "name": "RealESRGAN", "image": image, "scale": 2.0 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let output = raster::decode_image(&body_bytes(response).await).unwrap();
    assert_eq!(output.dimensions(), (8, 8));
    assert_eq!(output.alpha.as_ref().unwrap().get_pixel(7, 7)[0], 60);
    assert_eq!(output.metadata.get("parameters"), Some("kept"));
    settle().await;
}

#[tokio::test]
async fn test_gen_image_keeps_plugin_alpha() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_image",
            json!({ "name": "RemoveBG", "image": png_b64(4, 4) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let output = raster::decode_image(&body_bytes(response).await).unwrap();
    assert_eq!(output.alpha.as_ref().unwrap().get_pixel(0, 0)[0], 0);
}

#[tokio::test]
async fn test_gen_mask_renders_brush_overlay() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/run_plugin_gen_mask",
            json!({ "name": "InteractiveSeg", "image": png_b64(20, 20), "clicks": [[10, 10, 1]] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body_bytes(response).await;
    let overlay = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(overlay.get_pixel(10, 10), &BRUSH_COLOR);
    assert_eq!(overlay.get_pixel(14, 14), &BRUSH_COLOR);
    assert_eq!(overlay.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    assert_eq!(app.plugin(PluginKind::InteractiveSeg).mask_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_adjust_mask_route() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/adjust_mask",
            json!({ "mask": mask_b64(8, 8), "kernel_size": 1, "operate": "reverse" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let overlay = image::load_from_memory(&body_bytes(response).await).unwrap().to_rgba8();
    assert_eq!(overlay.get_pixel(0, 0), &BRUSH_COLOR);
    assert_eq!(overlay.get_pixel(4, 4)[3], 0);
}

#[tokio::test]
async fn test_switch_unknown_plugin_model_is_noop() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/switch_plugin_model",
            json!({ "plugin_name": "AnimeSeg", "model_name": "anything" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_switch_plugin_model_shows_in_server_config() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/switch_plugin_model",
            json!({ "plugin_name": "RemoveBG", "model_name": "u2net" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.plugin(PluginKind::RemoveBg).current_model(),
        Some("u2net".to_string())
    );

    let config = body_json(
        app.router
            .clone()
            .oneshot(get("/api/v1/server-config"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(config["removeBGModel"], "u2net");
    settle().await;
}

#[tokio::test]
async fn test_switch_plugin_model_outside_catalog() {
    let app = test_app(settings()).await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/v1/switch_plugin_model",
            json!({ "plugin_name": "RealESRGAN", "model_name": "not-a-model" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
