pub mod auth;
pub mod error;
pub mod events;
pub mod extract;
pub mod members;
pub mod middleware;
pub mod organizations;
pub mod rsvps;
pub mod sections;
pub mod users;

mod access;
mod convert;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tracing::error;

use bandhub_db::Database;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Builds the full API router. Everything except registration, login and the
/// health check sits behind [`middleware::require_auth`].
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/switch-organization", post(auth::switch_organization))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/{org_id}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/organizations/{org_id}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/organizations/{org_id}/members/{user_id}",
            delete(members::remove_member).patch(members::update_member),
        )
        .route(
            "/organizations/{org_id}/sections",
            get(sections::list_sections).post(sections::create_section),
        )
        .route(
            "/organizations/{org_id}/sections/{section_id}",
            delete(sections::delete_section),
        )
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/{event_id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/{event_id}/cancel", post(events::cancel_event))
        .route("/events/{event_id}/rsvp", put(rsvps::set_rsvp))
        .route("/events/{event_id}/rsvps", get(rsvps::list_rsvps))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Runs blocking database work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    offload(move || f(&state.db).map_err(ApiError::from)).await
}

/// Runs CPU-heavy or blocking work on tokio's blocking pool.
pub(crate) async fn offload<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })?
}
