use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::wallet::{TopupData, TopupRequest, WalletData},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::wallet_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wallet))
        .route("/topup", post(topup))
}

#[utoipa::path(
    get,
    path = "/wallet",
    responses(
        (status = 200, description = "Balance and transactions page", body = ApiResponse<WalletData>),
    ),
    tag = "Wallet"
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<WalletData>>> {
    let response = wallet_service::get_wallet(&state, &user, pagination).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/wallet/topup",
    request_body = TopupRequest,
    responses(
        (status = 200, description = "New balance", body = ApiResponse<TopupData>),
    ),
    tag = "Wallet"
)]
pub async fn topup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TopupRequest>,
) -> AppResult<Json<ApiResponse<TopupData>>> {
    let response = wallet_service::topup(&state, &user, payload).await?;
    Ok(Json(response))
}
