use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    server::AppState,
    transport::{
        middleware::add_response_headers,
        routes::{feed, info, transcode},
    },
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(info::index))
        .route("/version", get(info::version))
        .route("/vod/{channel}", get(feed::vod))
        .route("/vodonly/{channel}", get(feed::vod_only))
        .route("/transcode/{file}", get(transcode::transcode))
        .layer(middleware::from_fn(add_response_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
