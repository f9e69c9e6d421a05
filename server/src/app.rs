use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(&state.settings.static_dir)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .route("/api/config", get(routes::api::get_config))
        .route("/api/view", post(routes::api::post_view))
        .route("/api/colors", get(routes::api::get_colors))
        .route("/api/colors/assign", post(routes::api::assign_colors))
        .route("/api/colors/reset", post(routes::api::reset_colors))
        .route("/api/measure", post(routes::api::post_measure))
        .route(
            "/api/export/filtered",
            post(routes::export::export_filtered),
        )
        .route("/api/export/tagged", post(routes::export::export_tagged));

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success() {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control_for_path(&path)),
        );
    }

    response
}

/// The page shell must always be revalidated so it picks up new script
/// versions; scripts, styles and icons may be cached for an hour.
fn cache_control_for_path(path: &str) -> &'static str {
    let ext = Path::new(path).extension().and_then(|ext| ext.to_str());
    match ext {
        Some("js" | "css" | "svg" | "png" | "ico" | "woff2") => "public, max-age=3600",
        _ => "no-cache",
    }
}
