//! API layer - HTTP handlers and routing
//!
//! Public reads, registration, login and confirmation need no credentials.
//! Everything else sits behind [`middleware::require_auth`], with role gates
//! applied per route before any handler runs.

pub mod auth;
pub mod blog_posts;
pub mod comments;
pub mod common;
pub mod extract;
pub mod front;
pub mod images;
pub mod middleware;
pub mod responses;
pub mod users;


use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

use crate::services::storage::IMAGES_URL_PREFIX;

/// Build the API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(users::protected_router())
        .merge(blog_posts::writer_router())
        .merge(comments::commentator_router())
        .merge(images::writer_router(state.config.upload.max_file_size))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new()
        .merge(front::router())
        .merge(auth::router())
        .merge(users::public_router())
        .merge(blog_posts::public_router())
        .merge(comments::public_router())
        .merge(images::public_router())
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        match cors_origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", cors_origin);
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let images_dir = ServeDir::new(&state.config.upload.path);

    Router::new()
        .merge(build_api_router(state.clone()))
        .nest_service(IMAGES_URL_PREFIX, images_dir)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
