use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::bookings::FeedbackRequest,
    entity::{
        bookings::{Column as BookingCol, Entity as Bookings},
        feedbacks::{ActiveModel as FeedbackActive, Column as FeedbackCol, Entity as Feedbacks},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{BookingStatus, Feedback},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn check_rating(value: i16, field: &str) -> AppResult<()> {
    if !(1..=5).contains(&value) {
        return Err(AppError::InvalidInput(format!(
            "{field} must be between 1 and 5"
        )));
    }
    Ok(())
}

/// One feedback per booking, accepted only after completion.
pub async fn create_feedback(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
    payload: FeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    check_rating(payload.rating, "rating")?;
    if let Some(staff) = payload.staff_rating {
        check_rating(staff, "staff_rating")?;
    }
    if let Some(value) = payload.value_rating {
        check_rating(value, "value_rating")?;
    }

    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(booking_id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if booking.booking_status != BookingStatus::Completed.as_str() {
        return Err(AppError::IllegalTransition);
    }

    let existing = Feedbacks::find()
        .filter(FeedbackCol::BookingId.eq(booking_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::InvalidInput(
            "feedback already submitted for this booking".into(),
        ));
    }

    let row = FeedbackActive {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking_id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        staff_rating: Set(payload.staff_rating),
        value_rating: Set(payload.value_rating),
        comment: Set(payload.comment.clone()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let feedback = Feedback {
        id: row.id,
        booking_id: row.booking_id,
        user_id: row.user_id,
        rating: row.rating,
        staff_rating: row.staff_rating,
        value_rating: row.value_rating,
        comment: row.comment,
        created_at: row.created_at.with_timezone(&Utc),
    };

    Ok(ApiResponse::success(
        "Feedback recorded",
        feedback,
        Some(Meta::empty()),
    ))
}
