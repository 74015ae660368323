//! Router assembly

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use crate::api::handlers::{self, X_SEED};
use crate::error::panic_response;
use crate::middleware::RateLimitLayer;
use crate::AppState;

/// Build the application router
pub async fn create_router(state: Arc<AppState>) -> Router {
    let (output_dir, rate_limit, max_body_bytes) = {
        let settings = state.settings.read().await;
        (
            settings.storage.output_path(),
            settings.rate_limit.clone(),
            settings.server.max_body_bytes,
        )
    };

    let api = Router::new()
        .route("/gen-info", post(handlers::gen_info))
        .route("/server-config", get(handlers::server_config))
        .route("/model", get(handlers::current_model).post(handlers::switch_model))
        .route("/inputimage", get(handlers::input_image))
        .route("/inpaint", post(handlers::inpaint))
        .route("/switch_plugin_model", post(handlers::switch_plugin_model))
        .route("/run_plugin_gen_mask", post(handlers::run_plugin_gen_mask))
        .route("/run_plugin_gen_image", post(handlers::run_plugin_gen_image))
        .route("/samplers", get(handlers::samplers))
        .route("/adjust_mask", post(handlers::adjust_mask))
        .route("/save_image", post(handlers::save_image))
        .route("/unity_image", post(handlers::unity_image))
        .route("/unity_image_url", post(handlers::unity_image_url))
        .route("/send_to_unity", post(handlers::send_to_unity))
        .route("/cached_image/:image_id", get(handlers::cached_image));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api);

    if let Some(dir) = output_dir {
        info!(path = ?dir, "Serving output directory at /output");
        router = router.nest_service("/output", ServeDir::new(dir));
    }

    if rate_limit.enabled {
        info!(
            rps = rate_limit.requests_per_second,
            burst = rate_limit.burst_size,
            "Rate limiting enabled"
        );
        router = router.layer(RateLimitLayer::from_config(&rate_limit));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([X_SEED]);

    router
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
