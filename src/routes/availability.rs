use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::availability::{AvailabilityData, AvailabilityQuery},
    error::AppResult,
    response::ApiResponse,
    services::availability_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{shop_id}/availability", get(available_slots))
}

#[utoipa::path(
    get,
    path = "/shops/{shop_id}/availability",
    params(
        ("shop_id" = Uuid, Path, description = "Shop id"),
        ("date" = String, Query, description = "Date, YYYY-MM-DD"),
        ("service_ids" = String, Query, description = "Comma-separated service ids"),
    ),
    responses(
        (status = 200, description = "Day grid", body = ApiResponse<AvailabilityData>),
    ),
    tag = "Availability"
)]
pub async fn available_slots(
    State(state): State<AppState>,
    Path(shop_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<ApiResponse<AvailabilityData>>> {
    let response = availability_service::available_slots(&state, shop_id, query).await?;
    Ok(Json(response))
}
