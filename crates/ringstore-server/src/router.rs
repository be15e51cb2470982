use axum::routing::get;
use axum::Router;
use ringstore_protocol::endpoints;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all RingStore endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            &format!("{}/:key", endpoints::KV),
            get(handler::get_key)
                .post(handler::put_key)
                .put(handler::update_key)
                .delete(handler::remove_key),
        )
        .route(
            &format!("{}/:key", endpoints::OBJECT),
            get(handler::get_object)
                .post(handler::put_object)
                .delete(handler::remove_object),
        )
        .route(&format!("{}/:key", endpoints::LOOKUP), get(handler::lookup))
        .route(endpoints::CONFIG, get(handler::config))
        .route(endpoints::HEALTH, get(handler::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
