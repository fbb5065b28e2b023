use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::response::{ApiResponse, Meta};
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    /// "ok" when the database answers, "degraded" otherwise.
    pub status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database status", body = ApiResponse<HealthData>),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    let data = HealthData {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(ApiResponse::success(
        "Health check",
        data,
        Some(Meta::empty()),
    ))
}
