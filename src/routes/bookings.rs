use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::bookings::{
        BookingList, BookingWithServices, CancelBookingRequest, CancelOutcome,
        CreateBookingRequest, FeedbackRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Booking, Feedback},
    response::ApiResponse,
    routes::params::BookingListQuery,
    services::{booking_service, feedback_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/{id}", get(get_booking))
        .route("/{id}/cancel", patch(cancel_booking))
        .route("/{id}/complete", post(complete_booking))
        .route("/{id}/feedback", post(create_feedback))
}

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 200, description = "Booking confirmed", body = ApiResponse<BookingWithServices>),
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<ApiResponse<BookingWithServices>>> {
    let response = booking_service::create_booking(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/bookings", tag = "Bookings")]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let response = booking_service::list_bookings(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/bookings/{id}", tag = "Bookings")]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingWithServices>>> {
    let response = booking_service::get_booking(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/bookings/{id}/cancel",
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Cancelled, with refund when paid", body = ApiResponse<CancelOutcome>),
    ),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> AppResult<Json<ApiResponse<CancelOutcome>>> {
    let response = booking_service::cancel_booking(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/bookings/{id}/complete", tag = "Bookings")]
pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Booking>>> {
    let response = booking_service::complete_booking(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/feedback",
    request_body = FeedbackRequest,
    tag = "Bookings"
)]
pub async fn create_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeedbackRequest>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let response = feedback_service::create_feedback(&state, &user, id, payload).await?;
    Ok(Json(response))
}
