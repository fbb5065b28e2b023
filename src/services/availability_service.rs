use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    dto::availability::{AvailabilityData, AvailabilityQuery},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    scheduling::{DayHours, DayWindow, OccupancyIndex, ShopCalendar, available_starts},
    state::AppState,
};

#[derive(FromRow)]
pub(crate) struct ShopRow {
    pub id: Uuid,
    pub timezone: String,
    pub slot_minutes: i32,
    pub is_active: bool,
}

#[derive(FromRow)]
struct HoursRow {
    opening_time: Option<NaiveTime>,
    closing_time: Option<NaiveTime>,
    is_closed: bool,
}

#[derive(FromRow)]
struct BookingSpan {
    appointment_time: NaiveTime,
    total_duration_minutes: i32,
}

pub(crate) async fn fetch_shop(state: &AppState, shop_id: Uuid) -> AppResult<ShopRow> {
    let shop: Option<ShopRow> =
        sqlx::query_as("SELECT id, timezone, slot_minutes, is_active FROM shops WHERE id = $1")
            .bind(shop_id)
            .fetch_optional(&state.pool)
            .await?;
    let shop = shop.ok_or(AppError::NotFound)?;
    if !shop.is_active {
        return Err(AppError::InactiveResource);
    }
    Ok(shop)
}

pub(crate) fn parse_timezone(name: &str) -> AppResult<Tz> {
    Tz::from_str(name)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("shop has invalid timezone: {name}")))
}

pub(crate) fn parse_service_ids(raw: &str) -> AppResult<Vec<Uuid>> {
    let ids: Vec<Uuid> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Uuid::parse_str)
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::InvalidInput("malformed service id".into()))?;
    if ids.is_empty() {
        return Err(AppError::InvalidInput("service_ids must not be empty".into()));
    }
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != ids.len() {
        return Err(AppError::InvalidInput("duplicate service id".into()));
    }
    Ok(ids)
}

/// Total duration in minutes of the requested services; every id must exist,
/// belong to the shop and be active.
async fn total_duration(state: &AppState, shop_id: Uuid, ids: &[Uuid]) -> AppResult<i64> {
    #[derive(FromRow)]
    struct ServiceRow {
        duration_minutes: i32,
        is_active: bool,
    }

    let rows: Vec<ServiceRow> = sqlx::query_as(
        "SELECT duration_minutes, is_active FROM services WHERE shop_id = $1 AND id = ANY($2)",
    )
    .bind(shop_id)
    .bind(ids)
    .fetch_all(&state.pool)
    .await?;

    if rows.len() != ids.len() {
        return Err(AppError::NotFound);
    }
    if rows.iter().any(|r| !r.is_active) {
        return Err(AppError::InactiveResource);
    }
    Ok(rows.iter().map(|r| r.duration_minutes as i64).sum())
}

async fn build_calendar(
    state: &AppState,
    shop_id: Uuid,
    tz: Tz,
    date: NaiveDate,
) -> AppResult<ShopCalendar> {
    let mut calendar = ShopCalendar::new(tz);

    let weekday = chrono::Datelike::weekday(&date).num_days_from_monday() as i16;
    let hours: Option<HoursRow> = sqlx::query_as(
        "SELECT opening_time, closing_time, is_closed FROM business_hours WHERE shop_id = $1 AND weekday = $2",
    )
    .bind(shop_id)
    .bind(weekday)
    .fetch_optional(&state.pool)
    .await?;
    if let Some(row) = hours {
        calendar.set_hours(
            weekday as u8,
            DayHours {
                opening_time: row.opening_time,
                closing_time: row.closing_time,
                is_closed: row.is_closed,
            },
        );
    }

    let closing: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT reason FROM special_closing_days WHERE shop_id = $1 AND date = $2",
    )
    .bind(shop_id)
    .bind(date)
    .fetch_optional(&state.pool)
    .await?;
    if let Some((reason,)) = closing {
        calendar.add_closing(date, reason);
    }

    Ok(calendar)
}

/// The full day grid for a requested multi-service job. Lock-free; a racing
/// writer can make the answer momentarily stale, the booking path re-checks
/// under its own lock.
pub async fn available_slots(
    state: &AppState,
    shop_id: Uuid,
    query: AvailabilityQuery,
) -> AppResult<ApiResponse<AvailabilityData>> {
    let service_ids = parse_service_ids(&query.service_ids)?;
    let shop = fetch_shop(state, shop_id).await?;
    let tz = parse_timezone(&shop.timezone)?;
    let duration = total_duration(state, shop_id, &service_ids).await?;

    let calendar = build_calendar(state, shop_id, tz, query.date).await?;
    let window = calendar.open_interval(query.date);

    let (opening_time, closing_time, closed_reason) = match &window {
        DayWindow::Open { start, end } => (Some(*start), Some(*end), None),
        DayWindow::Closed { reason } => (None, None, reason.clone()),
    };

    let slots = if window.is_open() {
        let spans: Vec<BookingSpan> = sqlx::query_as(
            r#"
            SELECT appointment_time, total_duration_minutes
            FROM bookings
            WHERE shop_id = $1
              AND appointment_date = $2
              AND booking_status IN ('pending', 'confirmed')
            "#,
        )
        .bind(shop_id)
        .bind(query.date)
        .fetch_all(&state.pool)
        .await?;

        let occupancy = OccupancyIndex::new(
            shop.slot_minutes as i64,
            spans
                .iter()
                .map(|s| (s.appointment_time, s.total_duration_minutes as i64)),
        );

        let (today, now) = calendar.local_now(Utc::now());
        let now_local = (query.date == today).then_some(now);

        available_starts(&window, shop.slot_minutes as i64, duration, &occupancy, now_local)
    } else {
        Vec::new()
    };

    let data = AvailabilityData {
        date: query.date,
        open: window.is_open(),
        closed_reason,
        opening_time,
        closing_time,
        slot_minutes: shop.slot_minutes,
        total_duration_minutes: duration,
        slots,
    };

    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_service_ids(&format!("{a}, {b}")).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let id = Uuid::new_v4();
        assert!(matches!(
            parse_service_ids(&format!("{id},{id}")),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_empty_and_malformed_input() {
        assert!(matches!(
            parse_service_ids(" , "),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_service_ids("not-a-uuid"),
            Err(AppError::InvalidInput(_))
        ));
    }
}
