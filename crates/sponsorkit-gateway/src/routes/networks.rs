use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sponsorkit_chain::{supported_networks, ChainConfig, NetworkSummary};

use crate::state::AppState;

#[derive(Serialize)]
pub struct NetworksResponse {
    pub networks: Vec<NetworkSummary>,
    pub active: Option<ChainConfig>,
}

pub fn networks_router() -> Router<AppState> {
    Router::new().route("/networks", get(list_networks))
}

async fn list_networks(State(state): State<AppState>) -> Json<NetworksResponse> {
    Json(NetworksResponse {
        networks: supported_networks(),
        active: state.session().chain().await.map(|c| c.as_ref().clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_app;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_list_networks() {
        let t = test_app().await;
        let req = Request::builder().uri("/networks").body(Body::empty()).unwrap();
        let resp = networks_router()
            .with_state(t.state)
            .oneshot(req)
            .await
            .unwrap();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["networks"].as_array().unwrap().len(), 3);
        assert_eq!(json["active"]["name"], "Mumbai");
        assert_eq!(json["active"]["network"], "mumbai");
    }
}
