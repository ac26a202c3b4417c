use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sponsorkit_aa::StatusSnapshot;
use sponsorkit_common::TaskId;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CounterResponse {
    pub status: Option<StatusSnapshot>,
}

#[derive(Serialize)]
pub struct IncrementResponse {
    pub task_id: TaskId,
}

pub fn counter_router() -> Router<AppState> {
    Router::new()
        .route("/counter", get(get_counter))
        .route("/counter/increment", post(increment))
}

/// Latest snapshot published by the session's status poller.
async fn get_counter(State(state): State<AppState>) -> Json<CounterResponse> {
    Json(CounterResponse {
        status: state.app.status().await,
    })
}

async fn increment(State(state): State<AppState>) -> ApiResult<Json<IncrementResponse>> {
    let task_id = state.app.increment().await?;
    Ok(Json(IncrementResponse { task_id }))
}
