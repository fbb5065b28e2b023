use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::bookings::{BookingList, BookingWithServices, CancelBookingRequest, CancelOutcome, CreateBookingRequest},
    entity::{
        booking_services::{
            ActiveModel as LineActive, Column as LineCol, Entity as BookingServices,
            Model as LineModel,
        },
        bookings::{ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings, Model as BookingModel},
        business_hours::{Column as HoursCol, Entity as BusinessHours},
        services::{Column as ServiceCol, Entity as Services, Model as ServiceModel},
        shops::{Entity as Shops, Model as ShopModel},
        special_closing_days::{Column as ClosingCol, Entity as SpecialClosingDays},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Booking, BookingServiceLine, BookingStatus, PaymentMethod, PaymentStatus, TxnKind, WalletTransaction},
    outbox,
    payment::{self, ExternalPaymentRefs},
    response::{ApiResponse, Meta},
    routes::params::{BookingListQuery, SortOrder},
    scheduling::{DayHours, DayWindow, OccupancyIndex, ShopCalendar, SlotUnavailableReason, available_starts},
    services::{availability_service::parse_timezone, wallet_service},
    state::AppState,
};

/// Minimum lead for a user-initiated cancellation, in minutes.
pub const MIN_CANCEL_LEAD_MINUTES: i64 = 60;

/// Advisory lock key for one (shop, date). Collisions between distinct days
/// only over-serialise writers, which is safe.
fn day_lock_key(shop_id: Uuid, date: NaiveDate) -> i64 {
    let mut hasher = DefaultHasher::new();
    shop_id.hash(&mut hasher);
    date.hash(&mut hasher);
    (hasher.finish() >> 1) as i64
}

/// Serialise all writers for a (shop, date) until the transaction ends.
/// The wait is bounded; a writer that cannot take the lock in time gets a
/// retryable `ConcurrencyConflict` instead of queueing forever.
pub(crate) async fn lock_shop_day<C: ConnectionTrait>(
    conn: &C,
    shop_id: Uuid,
    date: NaiveDate,
) -> AppResult<()> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        "SET LOCAL lock_timeout = '5s'",
    ))
    .await?;
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock($1)",
        [day_lock_key(shop_id, date).into()],
    ))
    .await
    .map_err(|err| {
        if is_lock_timeout(&err) {
            AppError::ConcurrencyConflict
        } else {
            err.into()
        }
    })?;
    Ok(())
}

// Postgres reports 55P03 as "canceling statement due to lock timeout".
fn is_lock_timeout(err: &sea_orm::DbErr) -> bool {
    err.to_string().contains("lock timeout")
}

async fn load_active_shop(state: &AppState, shop_id: Uuid) -> AppResult<ShopModel> {
    let shop = Shops::find_by_id(shop_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !shop.is_active {
        return Err(AppError::InactiveResource);
    }
    Ok(shop)
}

async fn load_services(
    state: &AppState,
    shop_id: Uuid,
    ids: &[Uuid],
) -> AppResult<Vec<ServiceModel>> {
    if ids.is_empty() {
        return Err(AppError::InvalidInput("service_ids must not be empty".into()));
    }
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != ids.len() {
        return Err(AppError::InvalidInput("duplicate service id".into()));
    }

    let rows = Services::find()
        .filter(
            Condition::all()
                .add(ServiceCol::ShopId.eq(shop_id))
                .add(ServiceCol::Id.is_in(ids.to_vec())),
        )
        .all(&state.orm)
        .await?;
    if rows.len() != ids.len() {
        return Err(AppError::NotFound);
    }
    if rows.iter().any(|s| !s.is_active) {
        return Err(AppError::InactiveResource);
    }
    Ok(rows)
}

/// Build the shop calendar for one date from rows visible to `conn` (the
/// open transaction during writes, so the view is consistent with the lock).
pub(crate) async fn calendar_for_date<C: ConnectionTrait>(
    conn: &C,
    shop: &ShopModel,
    date: NaiveDate,
) -> AppResult<ShopCalendar> {
    let tz = parse_timezone(&shop.timezone)?;
    let mut calendar = ShopCalendar::new(tz);

    let weekday = chrono::Datelike::weekday(&date).num_days_from_monday() as i16;
    if let Some(row) = BusinessHours::find()
        .filter(
            Condition::all()
                .add(HoursCol::ShopId.eq(shop.id))
                .add(HoursCol::Weekday.eq(weekday)),
        )
        .one(conn)
        .await?
    {
        calendar.set_hours(
            weekday as u8,
            DayHours {
                opening_time: row.opening_time,
                closing_time: row.closing_time,
                is_closed: row.is_closed,
            },
        );
    }

    if let Some(row) = SpecialClosingDays::find()
        .filter(
            Condition::all()
                .add(ClosingCol::ShopId.eq(shop.id))
                .add(ClosingCol::Date.eq(date)),
        )
        .one(conn)
        .await?
    {
        calendar.add_closing(date, row.reason);
    }

    Ok(calendar)
}

pub(crate) async fn day_bookings<C: ConnectionTrait>(
    conn: &C,
    shop_id: Uuid,
    date: NaiveDate,
) -> AppResult<Vec<BookingModel>> {
    let rows = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::ShopId.eq(shop_id))
                .add(BookingCol::AppointmentDate.eq(date))
                .add(BookingCol::BookingStatus.is_in([
                    BookingStatus::Pending.as_str(),
                    BookingStatus::Confirmed.as_str(),
                ])),
        )
        .all(conn)
        .await?;
    Ok(rows)
}

/// Validate and atomically persist a booking.
///
/// The availability check runs inside the transaction while holding the
/// per-(shop, date) advisory lock, so two racing requests for overlapping
/// footprints cannot both commit.
pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<BookingWithServices>> {
    let shop = load_active_shop(state, payload.shop_id).await?;
    let services = load_services(state, shop.id, &payload.service_ids).await?;

    let total_duration: i64 = services.iter().map(|s| s.duration_minutes as i64).sum();
    let total_amount: i64 = services.iter().map(|s| s.price).sum();

    let tz = parse_timezone(&shop.timezone)?;
    let (today, _) = ShopCalendar::new(tz).local_now(Utc::now());
    if payload.date < today {
        return Err(AppError::PastDate);
    }

    // Verify the gateway signature before anything is written.
    let external_refs = match payload.payment_method {
        PaymentMethod::External => {
            let refs = payload
                .external
                .as_ref()
                .ok_or_else(|| AppError::InvalidInput("external payment refs required".into()))?;
            let refs = ExternalPaymentRefs {
                order_id: refs.order_id.clone(),
                payment_id: refs.payment_id.clone(),
                signature: refs.signature.clone(),
            };
            payment::verify_signature(&state.payment_secret, &refs)?;
            Some(refs)
        }
        PaymentMethod::Wallet => None,
    };

    let txn = state.orm.begin().await?;
    lock_shop_day(&txn, shop.id, payload.date).await?;

    // Conflict re-check against committed rows, under the lock.
    check_slot(&txn, &shop, payload.date, payload.start, total_duration).await?;

    let booking_id = Uuid::new_v4();
    let booking = BookingActive {
        id: Set(booking_id),
        user_id: Set(user.user_id),
        shop_id: Set(shop.id),
        appointment_date: Set(payload.date),
        appointment_time: Set(payload.start),
        total_duration_minutes: Set(total_duration as i32),
        total_amount: Set(total_amount),
        booking_status: Set(BookingStatus::Confirmed.as_str().into()),
        payment_status: Set(PaymentStatus::Paid.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        external_order_id: Set(external_refs.as_ref().map(|r| r.order_id.clone())),
        external_payment_id: Set(external_refs.as_ref().map(|r| r.payment_id.clone())),
        notes: Set(payload.notes.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut lines: Vec<BookingServiceLine> = Vec::new();
    for service in &services {
        let line = LineActive {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking.id),
            service_id: Set(service.id),
            name: Set(service.name.clone()),
            price: Set(service.price),
            duration_minutes: Set(service.duration_minutes),
        }
        .insert(&txn)
        .await?;
        lines.push(line_from_entity(line));
    }

    if payload.payment_method == PaymentMethod::Wallet {
        wallet_service::ledger_append(
            &txn,
            user.user_id,
            TxnKind::Debit,
            total_amount,
            &format!("booking {booking_id}"),
            Some(booking.id),
        )
        .await?;
    }

    outbox::append(
        &txn,
        outbox::TOPIC_BOOKING_CREATED,
        serde_json::json!({
            "booking_id": booking.id,
            "shop_id": shop.id,
            "user_id": user.user_id,
            "date": payload.date,
            "start": payload.start.format("%H:%M").to_string(),
        }),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(booking_id = %booking.id, shop_id = %shop.id, "booking created");

    Ok(ApiResponse::success(
        "Booking confirmed",
        BookingWithServices {
            booking: booking_from_entity(booking)?,
            services: lines,
        },
        Some(Meta::empty()),
    ))
}

/// Availability re-check for one candidate start, against rows visible to
/// `conn`. Maps the planner verdict to the precise failure kind.
async fn check_slot<C: ConnectionTrait>(
    conn: &C,
    shop: &ShopModel,
    date: NaiveDate,
    start: chrono::NaiveTime,
    total_duration: i64,
) -> AppResult<()> {
    let calendar = calendar_for_date(conn, shop, date).await?;
    let window = calendar.open_interval(date);
    if let DayWindow::Closed { .. } = window {
        return Err(AppError::ShopClosed);
    }

    let existing = day_bookings(conn, shop.id, date).await?;
    let occupancy = OccupancyIndex::new(
        shop.slot_minutes as i64,
        existing
            .iter()
            .map(|b| (b.appointment_time, b.total_duration_minutes as i64)),
    );

    let (today, now) = calendar.local_now(Utc::now());
    let now_local = (date == today).then_some(now);

    let grid = available_starts(
        &window,
        shop.slot_minutes as i64,
        total_duration,
        &occupancy,
        now_local,
    );
    let slot = grid
        .iter()
        .find(|s| s.start == start)
        .ok_or(AppError::OutsideBusinessHours)?;

    match slot.reason {
        None => Ok(()),
        Some(SlotUnavailableReason::Past) => Err(AppError::PastSlot),
        Some(SlotUnavailableReason::Conflict) => Err(AppError::SlotConflict),
    }
}

/// Cancel a booking the caller owns, refunding to the wallet when paid.
/// Cancelling an already-cancelled booking is a no-op that returns the
/// persisted state; it never issues a second refund.
pub async fn cancel_booking(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
    payload: CancelBookingRequest,
) -> AppResult<ApiResponse<CancelOutcome>> {
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::InvalidInput("reason must not be empty".into()));
    }

    let txn = state.orm.begin().await?;

    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(booking_id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let shop = Shops::find_by_id(booking.shop_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let calendar = ShopCalendar::new(parse_timezone(&shop.timezone)?);

    let (booking, refund) = cancel_locked(&txn, booking, &calendar, reason, false).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Booking cancelled",
        CancelOutcome { booking, refund },
        Some(Meta::empty()),
    ))
}

/// Shared cancellation path; the row must already be locked by the caller's
/// transaction. `force` bypasses the lead-time guard (forced shop closure).
pub(crate) async fn cancel_locked<C: ConnectionTrait>(
    conn: &C,
    booking: BookingModel,
    calendar: &ShopCalendar,
    reason: &str,
    force: bool,
) -> AppResult<(Booking, Option<WalletTransaction>)> {
    let status = parse_status(&booking.booking_status)?;
    match status {
        BookingStatus::Cancelled => return Ok((booking_from_entity(booking)?, None)),
        BookingStatus::Completed => return Err(AppError::IllegalTransition),
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }

    let now = Utc::now();
    if !force {
        let appointment = calendar
            .instant(booking.appointment_date, booking.appointment_time)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unresolvable appointment time")))?;
        if appointment - now < Duration::minutes(MIN_CANCEL_LEAD_MINUTES) {
            return Err(AppError::CancellationTooLate);
        }
    }

    let payment_status = parse_payment_status(&booking.payment_status)?;
    let user_id = booking.user_id;
    let booking_id = booking.id;
    let total_amount = booking.total_amount;
    let note = match &booking.notes {
        Some(existing) => format!("{existing}\n[cancelled {}] {reason}", now.format("%Y-%m-%d %H:%M UTC")),
        None => format!("[cancelled {}] {reason}", now.format("%Y-%m-%d %H:%M UTC")),
    };

    let mut active: BookingActive = booking.into();
    active.booking_status = Set(BookingStatus::Cancelled.as_str().into());
    active.notes = Set(Some(note));
    active.updated_at = Set(now.into());

    // Refunds always go to the wallet, also for externally paid bookings.
    let refund = if payment_status == PaymentStatus::Paid {
        let (_, row) = wallet_service::ledger_append(
            conn,
            user_id,
            TxnKind::Credit,
            total_amount,
            &format!("refund for booking {booking_id}"),
            Some(booking_id),
        )
        .await?;
        active.payment_status = Set(PaymentStatus::Refunded.as_str().into());
        Some(wallet_service::txn_from_entity(row)?)
    } else {
        None
    };

    let booking = active.update(conn).await?;

    outbox::append(
        conn,
        outbox::TOPIC_BOOKING_CANCELLED,
        serde_json::json!({
            "booking_id": booking.id,
            "shop_id": booking.shop_id,
            "user_id": booking.user_id,
            "refunded": refund.is_some(),
            "forced": force,
        }),
    )
    .await?;

    tracing::info!(booking_id = %booking.id, forced = force, "booking cancelled");

    Ok((booking_from_entity(booking)?, refund))
}

/// `confirmed -> completed`, only once the appointment instant has passed.
pub async fn complete_booking(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<Booking>> {
    let txn = state.orm.begin().await?;

    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(booking_id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if parse_status(&booking.booking_status)? != BookingStatus::Confirmed {
        return Err(AppError::IllegalTransition);
    }

    let shop = Shops::find_by_id(booking.shop_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let calendar = ShopCalendar::new(parse_timezone(&shop.timezone)?);
    let appointment = calendar
        .instant(booking.appointment_date, booking.appointment_time)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unresolvable appointment time")))?;
    if appointment > Utc::now() {
        return Err(AppError::IllegalTransition);
    }

    let mut active: BookingActive = booking.into();
    active.booking_status = Set(BookingStatus::Completed.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Booking completed",
        booking_from_entity(booking)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_bookings(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(BookingCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if BookingStatus::parse(status).is_none() {
            return Err(AppError::InvalidInput(format!("unknown status: {status}")));
        }
        condition = condition.add(BookingCol::BookingStatus.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Bookings::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(BookingCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(BookingCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(booking_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        BookingList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_booking(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> AppResult<ApiResponse<BookingWithServices>> {
    let booking = Bookings::find()
        .filter(
            Condition::all()
                .add(BookingCol::Id.eq(booking_id))
                .add(BookingCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let services = BookingServices::find()
        .filter(LineCol::BookingId.eq(booking.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(line_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        BookingWithServices {
            booking: booking_from_entity(booking)?,
            services,
        },
        Some(Meta::empty()),
    ))
}

fn parse_status(raw: &str) -> AppResult<BookingStatus> {
    BookingStatus::parse(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown booking status: {raw}")))
}

fn parse_payment_status(raw: &str) -> AppResult<PaymentStatus> {
    PaymentStatus::parse(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown payment status: {raw}")))
}

pub(crate) fn booking_from_entity(model: BookingModel) -> AppResult<Booking> {
    let booking_status = parse_status(&model.booking_status)?;
    let payment_status = parse_payment_status(&model.payment_status)?;
    let payment_method = PaymentMethod::parse(&model.payment_method).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown payment method: {}",
            model.payment_method
        ))
    })?;
    Ok(Booking {
        id: model.id,
        user_id: model.user_id,
        shop_id: model.shop_id,
        appointment_date: model.appointment_date,
        appointment_time: model.appointment_time,
        total_duration_minutes: model.total_duration_minutes,
        total_amount: model.total_amount,
        booking_status,
        payment_status,
        payment_method,
        external_order_id: model.external_order_id,
        external_payment_id: model.external_payment_id,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn line_from_entity(model: LineModel) -> BookingServiceLine {
    BookingServiceLine {
        id: model.id,
        booking_id: model.booking_id,
        service_id: model.service_id,
        name: model.name,
        price: model.price,
        duration_minutes: model.duration_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_lock_key_is_stable_and_non_negative() {
        let shop = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let a = day_lock_key(shop, date);
        let b = day_lock_key(shop, date);
        assert_eq!(a, b);
        assert!(a >= 0);
    }

    #[test]
    fn day_lock_key_differs_across_days() {
        let shop = Uuid::new_v4();
        let mon = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let tue = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        assert_ne!(day_lock_key(shop, mon), day_lock_key(shop, tue));
    }

    #[test]
    fn lock_timeout_is_detected() {
        let timeout = sea_orm::DbErr::Custom(
            "canceling statement due to lock timeout".into(),
        );
        assert!(is_lock_timeout(&timeout));

        let other = sea_orm::DbErr::Custom("duplicate key value".into());
        assert!(!is_lock_timeout(&other));
    }
}
