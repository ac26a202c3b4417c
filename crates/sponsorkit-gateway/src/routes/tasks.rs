use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sponsorkit_common::Task;

use crate::state::AppState;

#[derive(Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
    pub pending: usize,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub settled: usize,
    pub tasks: Vec<Task>,
}

pub fn tasks_router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/refresh", post(refresh_tasks))
}

async fn list_tasks(State(state): State<AppState>) -> Json<TasksResponse> {
    Json(TasksResponse {
        tasks: state.app.tasks(),
        pending: state.session().tracker().pending_count(),
    })
}

async fn refresh_tasks(State(state): State<AppState>) -> Json<RefreshResponse> {
    let settled = state.app.refresh_tasks().await;
    Json(RefreshResponse {
        settled,
        tasks: state.app.tasks(),
    })
}
