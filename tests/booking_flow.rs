use axum_booking_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        bookings::{CancelBookingRequest, CreateBookingRequest, ExternalPaymentPayload, FeedbackRequest},
        shops::CloseDateRequest,
        wallet::TopupRequest,
    },
    entity::{
        bookings::ActiveModel as BookingActive, business_hours::ActiveModel as HoursActive,
        services::ActiveModel as ServiceActive, shops::ActiveModel as ShopActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{BookingStatus, PaymentMethod, PaymentStatus, TxnKind},
    routes::{health, params::Pagination},
    services::{availability_service, booking_service, feedback_service, shop_service, wallet_service},
    state::AppState,
};
use axum::extract::State;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use hmac::{Hmac, Mac};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use sha2::Sha256;
use uuid::Uuid;

const PAYMENT_SECRET: &str = "test-payment-secret";
const TZ: &str = "Asia/Kolkata";

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

// A Monday at least a week out, so nothing trips the past-date guard.
fn future_monday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(7);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

fn sign(order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(PAYMENT_SECRET.as_bytes()).unwrap();
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// Full lifecycle: topup -> availability -> wallet booking -> conflict ->
// insufficient funds -> external payment -> cancel with refund (idempotent) ->
// forced closure -> completion + feedback -> late cancel.
#[tokio::test]
async fn booking_lifecycle_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let u1 = create_user(&state, "user", "u1@example.com").await?;
    let u2 = create_user(&state, "user", "u2@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let user1 = AuthUser {
        user_id: u1,
        role: "user".into(),
    };
    let user2 = AuthUser {
        user_id: u2,
        role: "user".into(),
    };
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Shop open Mondays 09:00-12:00 with a single 30-minute service.
    let shop_id = Uuid::new_v4();
    ShopActive {
        id: Set(shop_id),
        name: Set("Fade Factory".into()),
        timezone: Set(TZ.into()),
        slot_minutes: Set(30),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    HoursActive {
        id: Set(Uuid::new_v4()),
        shop_id: Set(shop_id),
        weekday: Set(0),
        opening_time: Set(Some(t(9, 0))),
        closing_time: Set(Some(t(12, 0))),
        is_closed: Set(false),
    }
    .insert(&state.orm)
    .await?;
    let service_a = ServiceActive {
        id: Set(Uuid::new_v4()),
        shop_id: Set(shop_id),
        name: Set("Signature Cut".into()),
        price: Set(10_000),
        duration_minutes: Set(30),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let date = future_monday();

    // Topup: U1 starts with 500.00.
    let topup = wallet_service::topup(
        &state,
        &admin,
        TopupRequest {
            user_id: u1,
            amount: 50_000,
            reference: Some("seed".into()),
        },
    )
    .await?;
    assert_eq!(topup.data.unwrap().balance, 50_000);

    // Every slot of the empty day is bookable.
    let avail = availability_service::available_slots(
        &state,
        shop_id,
        availability_query(date, &[service_a.id]),
    )
    .await?
    .data
    .unwrap();
    assert!(avail.open);
    assert_eq!(avail.slots.len(), 6);
    assert!(avail.slots.iter().all(|s| s.available));

    // Wallet booking at 10:00.
    let booking = booking_service::create_booking(
        &state,
        &user1,
        CreateBookingRequest {
            shop_id,
            date,
            start: t(10, 0),
            service_ids: vec![service_a.id],
            payment_method: PaymentMethod::Wallet,
            notes: None,
            external: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(booking.booking.booking_status, BookingStatus::Confirmed);
    assert_eq!(booking.booking.payment_status, PaymentStatus::Paid);
    assert_eq!(booking.booking.total_amount, 10_000);
    assert_eq!(booking.services.len(), 1);

    let wallet = wallet_service::get_wallet(&state, &user1, all_pages()).await?;
    let wallet = wallet.data.unwrap();
    assert_eq!(wallet.wallet.balance, 40_000);
    assert_eq!(wallet.transactions.len(), 2);
    assert!(
        wallet
            .transactions
            .iter()
            .any(|tx| tx.kind == TxnKind::Debit && tx.amount == 10_000)
    );

    // The slot is now reported as a conflict.
    let avail = availability_service::available_slots(
        &state,
        shop_id,
        availability_query(date, &[service_a.id]),
    )
    .await?
    .data
    .unwrap();
    let ten = avail.slots.iter().find(|s| s.start == t(10, 0)).unwrap();
    assert!(!ten.available);

    // Racing second booking for the same slot fails.
    let conflict = booking_service::create_booking(
        &state,
        &user2,
        CreateBookingRequest {
            shop_id,
            date,
            start: t(10, 0),
            service_ids: vec![service_a.id],
            payment_method: PaymentMethod::Wallet,
            notes: None,
            external: None,
        },
    )
    .await;
    assert!(matches!(conflict, Err(AppError::SlotConflict)));

    // U2 has no funds.
    let broke = booking_service::create_booking(
        &state,
        &user2,
        CreateBookingRequest {
            shop_id,
            date,
            start: t(10, 30),
            service_ids: vec![service_a.id],
            payment_method: PaymentMethod::Wallet,
            notes: None,
            external: None,
        },
    )
    .await;
    assert!(matches!(broke, Err(AppError::InsufficientFunds)));

    // Externally paid booking with a valid gateway signature.
    let external = booking_service::create_booking(
        &state,
        &user2,
        CreateBookingRequest {
            shop_id,
            date,
            start: t(10, 30),
            service_ids: vec![service_a.id],
            payment_method: PaymentMethod::External,
            notes: None,
            external: Some(ExternalPaymentPayload {
                order_id: "order_1".into(),
                payment_id: "pay_1".into(),
                signature: sign("order_1", "pay_1"),
            }),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(external.booking.payment_method, PaymentMethod::External);
    assert_eq!(external.booking.payment_status, PaymentStatus::Paid);

    // A tampered signature writes nothing.
    let forged = booking_service::create_booking(
        &state,
        &user2,
        CreateBookingRequest {
            shop_id,
            date,
            start: t(11, 0),
            service_ids: vec![service_a.id],
            payment_method: PaymentMethod::External,
            notes: None,
            external: Some(ExternalPaymentPayload {
                order_id: "order_2".into(),
                payment_id: "pay_2".into(),
                signature: sign("order_2", "pay_other"),
            }),
        },
    )
    .await;
    assert!(matches!(forged, Err(AppError::PaymentVerificationFailed)));

    // Cancel with refund, well before the appointment.
    let cancelled = booking_service::cancel_booking(
        &state,
        &user1,
        booking.booking.id,
        CancelBookingRequest {
            reason: "changed plans".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.booking.booking_status, BookingStatus::Cancelled);
    assert_eq!(cancelled.booking.payment_status, PaymentStatus::Refunded);
    assert!(cancelled.refund.is_some());

    let wallet = wallet_service::get_wallet(&state, &user1, all_pages()).await?;
    let wallet = wallet.data.unwrap();
    assert_eq!(wallet.wallet.balance, 50_000);
    assert_eq!(wallet.transactions.len(), 3);

    // Second cancel is a no-op and never doubles the refund.
    let again = booking_service::cancel_booking(
        &state,
        &user1,
        booking.booking.id,
        CancelBookingRequest {
            reason: "changed plans".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(again.booking.booking_status, BookingStatus::Cancelled);
    assert!(again.refund.is_none());
    let wallet = wallet_service::get_wallet(&state, &user1, all_pages()).await?;
    assert_eq!(wallet.data.unwrap().transactions.len(), 3);

    // Forced closure refunds the remaining externally paid booking to U2's
    // wallet, lead time notwithstanding.
    let closure = shop_service::close_date(
        &state,
        &admin,
        shop_id,
        CloseDateRequest {
            date,
            reason: Some("renovation".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(closure.cancelled_booking_ids, vec![external.booking.id]);
    let wallet2 = wallet_service::get_wallet(&state, &user2, all_pages()).await?;
    assert_eq!(wallet2.data.unwrap().wallet.balance, 10_000);

    // The closed day no longer offers slots.
    let avail = availability_service::available_slots(
        &state,
        shop_id,
        availability_query(date, &[service_a.id]),
    )
    .await?
    .data
    .unwrap();
    assert!(!avail.open);
    assert_eq!(avail.closed_reason.as_deref(), Some("renovation"));
    assert!(avail.slots.is_empty());

    // Completion and feedback need an appointment already behind us; seed one.
    let past_booking_id = seed_confirmed_booking(
        &state,
        u1,
        shop_id,
        Utc::now().date_naive() - Duration::days(7),
        t(10, 0),
    )
    .await?;
    let completed = booking_service::complete_booking(&state, &user1, past_booking_id).await?;
    assert_eq!(
        completed.data.unwrap().booking_status,
        BookingStatus::Completed
    );

    let feedback = feedback_service::create_feedback(
        &state,
        &user1,
        past_booking_id,
        FeedbackRequest {
            rating: 5,
            staff_rating: Some(4),
            value_rating: None,
            comment: Some("sharp fade".into()),
        },
    )
    .await?;
    assert_eq!(feedback.data.unwrap().rating, 5);

    let duplicate = feedback_service::create_feedback(
        &state,
        &user1,
        past_booking_id,
        FeedbackRequest {
            rating: 4,
            staff_rating: None,
            value_rating: None,
            comment: None,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::InvalidInput(_))));

    // Feedback before completion is rejected.
    let early = feedback_service::create_feedback(
        &state,
        &user1,
        booking.booking.id,
        FeedbackRequest {
            rating: 3,
            staff_rating: None,
            value_rating: None,
            comment: None,
        },
    )
    .await;
    assert!(matches!(early, Err(AppError::IllegalTransition)));

    // Cancelling inside the 60-minute window is rejected.
    let soon = chrono::Utc::now().with_timezone(&chrono_tz::Tz::Asia__Kolkata) + Duration::minutes(30);
    let late_booking_id = seed_confirmed_booking(
        &state,
        u1,
        shop_id,
        soon.date_naive(),
        soon.time().with_nanosecond(0).unwrap(),
    )
    .await?;
    let too_late = booking_service::cancel_booking(
        &state,
        &user1,
        late_booking_id,
        CancelBookingRequest {
            reason: "cold feet".into(),
        },
    )
    .await;
    assert!(matches!(too_late, Err(AppError::CancellationTooLate)));

    // Health reports ok with a live pool.
    let health = health::health_check(State(state.clone())).await;
    assert_eq!(health.0.data.unwrap().status, "ok");

    // Two racing requests for the same open slot: exactly one commits, the
    // other sees the committed row under the day lock.
    let race_date = date + Duration::days(7);
    let request_at = |start: NaiveTime| CreateBookingRequest {
        shop_id,
        date: race_date,
        start,
        service_ids: vec![service_a.id],
        payment_method: PaymentMethod::Wallet,
        notes: None,
        external: None,
    };
    let (first, second) = tokio::join!(
        booking_service::create_booking(&state, &user1, request_at(t(9, 0))),
        booking_service::create_booking(&state, &user2, request_at(t(9, 0))),
    );
    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    for outcome in [first, second] {
        if let Err(err) = outcome {
            assert!(matches!(err, AppError::SlotConflict));
        }
    }

    // Concurrent first-ever credits must both land on a single wallet row.
    let u3 = create_user(&state, "user", "u3@example.com").await?;
    let (a, b) = tokio::join!(
        wallet_service::topup(
            &state,
            &admin,
            TopupRequest {
                user_id: u3,
                amount: 1_000,
                reference: None,
            },
        ),
        wallet_service::topup(
            &state,
            &admin,
            TopupRequest {
                user_id: u3,
                amount: 2_000,
                reference: None,
            },
        ),
    );
    a?;
    b?;
    let user3 = AuthUser {
        user_id: u3,
        role: "user".into(),
    };
    let w3 = wallet_service::get_wallet(&state, &user3, all_pages()).await?;
    assert_eq!(w3.data.unwrap().wallet.balance, 3_000);

    Ok(())
}

fn availability_query(
    date: NaiveDate,
    service_ids: &[Uuid],
) -> axum_booking_api::dto::availability::AvailabilityQuery {
    axum_booking_api::dto::availability::AvailabilityQuery {
        date,
        service_ids: service_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn all_pages() -> Pagination {
    Pagination {
        page: None,
        per_page: None,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE feedbacks, wallet_transactions, wallets, booking_services, bookings, \
         special_closing_days, business_hours, services, shops, outbox_events, users \
         RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        payment_secret: PAYMENT_SECRET.into(),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn seed_confirmed_booking(
    state: &AppState,
    user_id: Uuid,
    shop_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
) -> anyhow::Result<Uuid> {
    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        shop_id: Set(shop_id),
        appointment_date: Set(date),
        appointment_time: Set(time),
        total_duration_minutes: Set(30),
        total_amount: Set(10_000),
        booking_status: Set("confirmed".into()),
        payment_status: Set("paid".into()),
        payment_method: Set("wallet".into()),
        external_order_id: Set(None),
        external_payment_id: Set(None),
        notes: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(booking.id)
}
