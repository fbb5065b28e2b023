use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::shops::{CloseDateData, CloseDateRequest, ServiceList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::shop_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{shop_id}/services", get(list_services))
        .route("/{shop_id}/closing-days", post(close_date))
}

#[utoipa::path(get, path = "/shops/{shop_id}/services", tag = "Shops")]
pub async fn list_services(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ServiceList>>> {
    let response = shop_service::list_services(&state, shop_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/shops/{shop_id}/closing-days",
    request_body = CloseDateRequest,
    responses(
        (status = 200, description = "Date closed, affected bookings refunded", body = ApiResponse<CloseDateData>),
    ),
    tag = "Shops"
)]
pub async fn close_date(
    State(state): State<AppState>,
    user: AuthUser,
    Path(shop_id): Path<Uuid>,
    Json(payload): Json<CloseDateRequest>,
) -> AppResult<Json<ApiResponse<CloseDateData>>> {
    let response = shop_service::close_date(&state, &user, shop_id, payload).await?;
    Ok(Json(response))
}
