//! Functional tests for the inference worker protocol

use image::{DynamicImage, GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use inpaint_gateway::backend::http_backend::{HttpBackendProvider, WorkerClient};
use inpaint_gateway::backend::{BackendProvider, InpaintBackend, InpaintParams};
use inpaint_gateway::codec::{raster, ImageMetadata};
use inpaint_gateway::config::WorkerConfig;
use inpaint_gateway::plugin::{HttpPlugin, Plugin, PluginKind, PluginParams};
use inpaint_gateway::AppError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn worker(server: &MockServer) -> WorkerClient {
    WorkerClient::new(&WorkerConfig {
        endpoint: format!("{}/", server.uri()),
        timeout_ms: 5_000,
    })
    .unwrap()
}

fn png_bytes(image: DynamicImage) -> Vec<u8> {
    raster::encode_png(&image, &ImageMetadata::new()).unwrap().bytes
}

#[tokio::test]
async fn test_load_and_inpaint_through_worker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/model"))
        .and(body_partial_json(json!({ "name": "lama" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "lama",
            "path": "lama",
            "model_type": "inpaint",
            "support_strength": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/inpaint"))
        .and(body_partial_json(json!({ "model": "lama", "params": { "sd_seed": 7 } })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/reclaim"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let provider = HttpBackendProvider::new(worker(&server));
    let backend = provider.load("lama").await.unwrap();
    assert_eq!(backend.name(), "lama");

    let params = InpaintParams {
        sd_seed: 7,
        ..InpaintParams::default()
    };
    let result = backend
        .inpaint(&RgbImage::new(4, 4), &GrayImage::new(4, 4), &params)
        .await
        .unwrap();
    assert_eq!(result.get_pixel(0, 0), &Rgb([1, 2, 3]));

    backend.reclaim_memory().await;
}

#[tokio::test]
async fn test_unknown_model_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/model"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let provider = HttpBackendProvider::new(worker(&server));
    let result = provider.load("ghost").await;
    assert!(matches!(result, Err(AppError::ModelNotFound(name)) if name == "ghost"));
}

#[tokio::test]
async fn test_worker_failure_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = HttpBackendProvider::new(worker(&server));
    assert!(matches!(provider.scan_models().await, Err(AppError::BackendError(_))));
}

#[tokio::test]
async fn test_plugin_dispatch_and_model_switch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/plugins/RemoveBG/gen_image"))
        .and(body_partial_json(json!({ "model": "briaai/RMBG-1.4" })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([5, 5, 5, 0]))),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/plugins/RemoveBG/model"))
        .and(body_partial_json(json!({ "model_name": "u2net" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let plugin = HttpPlugin::new(PluginKind::RemoveBg, worker(&server), None);
    let output = plugin
        .gen_image(&RgbImage::new(2, 2), &PluginParams::default())
        .await
        .unwrap();
    assert!(output.color().has_alpha());

    plugin.switch_model("u2net").await.unwrap();
    assert_eq!(plugin.current_model().as_deref(), Some("u2net"));
    // Already selected: no second request
    plugin.switch_model("u2net").await.unwrap();
}

#[tokio::test]
async fn test_plugin_refuses_unsupported_capability_locally() {
    let server = MockServer::start().await;
    let plugin = HttpPlugin::new(PluginKind::RealEsrgan, worker(&server), None);

    let result = plugin.gen_mask(&RgbImage::new(2, 2), &PluginParams::default()).await;
    assert!(matches!(result, Err(AppError::CapabilityUnsupported { .. })));
    assert!(server.received_requests().await.unwrap().is_empty());
}
