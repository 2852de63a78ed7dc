pub mod activation;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod hotspot;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod util;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;

/// Full HTTP surface. Admin routes exist only when an admin key is set.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(handlers::public::router())
        .merge(handlers::webhooks::router());

    if state.admin_api_key.is_some() {
        router = router.merge(handlers::admin::router(state.clone()));
    }

    router
        .layer(TraceLayer::new_for_http())
        // The portal page is served by the router, not by us
        .layer(CorsLayer::permissive())
        .with_state(state)
}
