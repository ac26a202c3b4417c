use alloy_primitives::Address;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sponsorkit_chain::ChainConfig;
use sponsorkit_common::{UserInfo, WalletAccount};
use sponsorkit_session::SessionState;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request/Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SmartWalletView {
    pub address: Address,
    pub is_deployed: Option<bool>,
}

#[derive(Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub chain: Option<ChainConfig>,
    pub user: Option<UserInfo>,
    pub account: Option<WalletAccount>,
    pub smart_wallet: Option<SmartWalletView>,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub closed: bool,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/login", post(login))
        .route("/session/logout", post(logout))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn session_view(state: &AppState) -> SessionView {
    let session = state.session();
    let smart_wallet = match session.smart_wallet().await {
        Some(wallet) => match wallet.get_address() {
            Ok(address) => Some(SmartWalletView {
                address,
                is_deployed: wallet.is_deployed().await.ok(),
            }),
            Err(_) => None,
        },
        None => None,
    };

    SessionView {
        state: session.state().await,
        session_id: session.session_id().await,
        chain: session.chain().await.map(|c| c.as_ref().clone()),
        user: session.user_info().await.ok(),
        account: session.wallet_account().await.ok(),
        smart_wallet,
    }
}

async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(session_view(&state).await)
}

async fn login(State(state): State<AppState>) -> ApiResult<Json<SessionView>> {
    state.app.login().await?;
    Ok(Json(session_view(&state).await))
}

async fn logout(State(state): State<AppState>) -> Json<LogoutResponse> {
    let closed = state.session().logout().await;
    Json(LogoutResponse { closed })
}
