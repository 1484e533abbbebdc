// Route modules
pub mod entitlements;

use crate::{
    app_state::AppState,
    middleware::{jwt_auth_middleware, logging_middleware},
};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes(state.clone()))
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes(state: AppState) -> Router<AppState> {
    // Entitlement routes requiring an authenticated user
    let protected_routes = Router::new()
        .route("/purchases", post(entitlements::purchase))
        .route("/purchases/restore", post(entitlements::restore_purchases))
        .route("/identity/link", post(entitlements::link_identity))
        .route("/subscription/sync", post(entitlements::sync_subscription))
        .route("/subscription", delete(entitlements::delete_subscription))
        .route("/plan", get(entitlements::get_plan))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new().route("/offerings", get(entitlements::get_offerings));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
}
