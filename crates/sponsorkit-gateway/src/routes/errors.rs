use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorView {
    pub error: Option<String>,
}

pub fn errors_router() -> Router<AppState> {
    Router::new().route("/errors", get(latest_error).delete(clear_error))
}

async fn latest_error(State(state): State<AppState>) -> Json<ErrorView> {
    Json(ErrorView {
        error: state.app.errors().latest(),
    })
}

async fn clear_error(State(state): State<AppState>) -> StatusCode {
    state.app.errors().clear();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_app;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use sponsorkit_common::SponsorError;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_read_and_clear() {
        let t = test_app().await;
        t.state.app.errors().report(&SponsorError::WalletNotInitialized);
        let router = errors_router().with_state(t.state.clone());

        let req = Request::builder().uri("/errors").body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "smart wallet is not initialized");

        let req = Request::builder()
            .method("DELETE")
            .uri("/errors")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(t.state.app.errors().latest().is_none());
    }
}
