pub mod counter;
pub mod errors;
pub mod networks;
pub mod session;
pub mod tasks;

use axum::Router;
use crate::state::AppState;

/// Build the complete API router
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(networks::networks_router())
        .merge(session::session_router())
        .merge(counter::counter_router())
        .merge(tasks::tasks_router())
        .merge(errors::errors_router())
}
