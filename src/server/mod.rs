mod api;
mod error;
mod snapshot;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request};
use axum::http::header::LOCATION;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::error::{AppError, http_status, status_of};
pub use self::snapshot::*;
pub use self::state::*;
pub use self::types::*;
use crate::metrics;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::add_feature_handler,
        api::get_feature_handler,
        api::label_handler,
        api::refresh_handler,
    ),
    components(schemas(
        types::AddFeatureResponse,
        types::FeatureResponse,
        types::LabelResponse,
        types::RefreshResponse,
        types::ErrorResponse,
    ))
)]
pub struct ApiDoc;

/// 按路由统计请求数量
async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_default();
    let method = req.method().clone();
    let response = next.run(req).await;
    metrics::inc_request(method.as_str(), &route, response.status().as_u16());
    response
}

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let base = state.config.normalized_base();

    let routes = Router::new()
        .route("/images", post(api::add_feature_handler).fallback(error::not_found_handler))
        .route("/images/{id}", get(api::get_feature_handler).fallback(error::not_found_handler))
        .route("/labels/{id}", get(api::label_handler).fallback(error::not_found_handler))
        .route("/refresh", post(api::refresh_handler).fallback(error::not_found_handler))
        .route_layer(middleware::from_fn(track_metrics));

    // NOTE: axum 不允许在根路径上 nest；方法不匹配时同样返回 404 而不是 405
    let router = if base.is_empty() { routes } else { Router::new().nest(&base, routes) };

    router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(error::not_found_handler)
        .layer(CorsLayer::permissive().expose_headers([LOCATION]))
        .layer(CatchPanicLayer::custom(error::panic_handler))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .layer(middleware::map_response(error::structured_error))
        .with_state(state)
}
