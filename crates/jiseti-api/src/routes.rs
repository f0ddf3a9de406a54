use axum::{
    Json, Router, middleware,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{admin, auth, public, records, votes};

/// The full HTTP surface. Layers that belong to the deployment (CORS,
/// tracing) are added by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/auth/signup", post(auth::user_signup))
        .route("/auth/login", post(auth::user_login))
        .route("/admin/signup", post(auth::admin_signup))
        .route("/admin/login", post(auth::admin_login))
        .route("/public/records", get(public::list_public))
        .route("/public/records/{id}", get(public::get_public))
        .route("/public/report", post(public::submit_report))
        .route("/public/track/{token}", get(public::track))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user", get(auth::profile))
        .route("/user/profile", patch(auth::update_profile))
        .route("/records", post(records::create_record))
        .route(
            "/records/{id}",
            get(records::get_one)
                .patch(records::update)
                .delete(records::delete),
        )
        .route("/records/{id}/media", post(records::add_media))
        .route("/records/{id}/status", patch(records::change_status))
        .route("/records/{id}/history", get(records::history))
        .route("/records/{id}/vote", post(votes::cast_vote).delete(votes::remove_vote))
        .route("/my-records", get(records::list_mine))
        .route("/admin/records", get(admin::list_records_page))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Jiseti API",
        "description": "Report corruption and request government intervention",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route")
}
