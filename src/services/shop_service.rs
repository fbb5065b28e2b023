use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::shops::{CloseDateData, CloseDateRequest, ServiceList},
    entity::{
        bookings::{Column as BookingCol, Entity as Bookings},
        services::{Column as ServiceCol, Entity as Services},
        shops::Entity as Shops,
        special_closing_days::{
            ActiveModel as ClosingActive, Column as ClosingCol, Entity as SpecialClosingDays,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{BookingStatus, Service, SpecialClosingDay},
    response::{ApiResponse, Meta},
    scheduling::ShopCalendar,
    services::{availability_service::parse_timezone, booking_service},
    state::AppState,
};

/// Active service catalogue of a shop.
pub async fn list_services(state: &AppState, shop_id: Uuid) -> AppResult<ApiResponse<ServiceList>> {
    let shop = Shops::find_by_id(shop_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !shop.is_active {
        return Err(AppError::InactiveResource);
    }

    let items = Services::find()
        .filter(
            Condition::all()
                .add(ServiceCol::ShopId.eq(shop_id))
                .add(ServiceCol::IsActive.eq(true)),
        )
        .order_by_asc(ServiceCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|m| Service {
            id: m.id,
            shop_id: m.shop_id,
            name: m.name,
            price: m.price,
            duration_minutes: m.duration_minutes,
            is_active: m.is_active,
            created_at: m.created_at.with_timezone(&Utc),
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        ServiceList { items },
        Some(Meta::empty()),
    ))
}

/// Close a date for the shop. Existing non-terminal bookings on that date are
/// force-cancelled with a wallet refund, bypassing the lead-time guard.
pub async fn close_date(
    state: &AppState,
    user: &AuthUser,
    shop_id: Uuid,
    payload: CloseDateRequest,
) -> AppResult<ApiResponse<CloseDateData>> {
    ensure_admin(user)?;

    let shop = Shops::find_by_id(shop_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let calendar = ShopCalendar::new(parse_timezone(&shop.timezone)?);

    let txn = state.orm.begin().await?;
    // Same lock as the booking path, so the closure cannot interleave with a
    // racing createBooking for the date.
    booking_service::lock_shop_day(&txn, shop_id, payload.date).await?;

    let already = SpecialClosingDays::find()
        .filter(
            Condition::all()
                .add(ClosingCol::ShopId.eq(shop_id))
                .add(ClosingCol::Date.eq(payload.date)),
        )
        .one(&txn)
        .await?;
    if already.is_some() {
        return Err(AppError::InvalidInput("date is already closed".into()));
    }

    let closing = ClosingActive {
        id: Set(Uuid::new_v4()),
        shop_id: Set(shop_id),
        date: Set(payload.date),
        reason: Set(payload.reason.clone()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let affected = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::ShopId.eq(shop_id))
                .add(BookingCol::AppointmentDate.eq(payload.date))
                .add(BookingCol::BookingStatus.is_in([
                    BookingStatus::Pending.as_str(),
                    BookingStatus::Confirmed.as_str(),
                ])),
        )
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    let reason = payload
        .reason
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or("shop closed on this date");

    let mut cancelled_booking_ids = Vec::with_capacity(affected.len());
    for booking in affected {
        let id = booking.id;
        booking_service::cancel_locked(&txn, booking, &calendar, reason, true).await?;
        cancelled_booking_ids.push(id);
    }

    txn.commit().await?;

    tracing::info!(
        shop_id = %shop_id,
        date = %payload.date,
        cancelled = cancelled_booking_ids.len(),
        "date closed"
    );

    Ok(ApiResponse::success(
        "Date closed",
        CloseDateData {
            closing: SpecialClosingDay {
                id: closing.id,
                shop_id: closing.shop_id,
                date: closing.date,
                reason: closing.reason,
                created_at: closing.created_at.with_timezone(&Utc),
            },
            cancelled_booking_ids,
        },
        Some(Meta::empty()),
    ))
}
