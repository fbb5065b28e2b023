use std::time::Duration;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entity::outbox_events::ActiveModel as OutboxActive,
    error::AppResult,
};

pub const TOPIC_BOOKING_CREATED: &str = "booking.created";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";

/// Append an event row on the caller's transaction. The row becomes visible
/// to the dispatcher only after that transaction commits, which gives
/// at-least-once delivery after a successful write.
pub async fn append<C: ConnectionTrait>(conn: &C, topic: &str, payload: Value) -> AppResult<()> {
    OutboxActive {
        id: Set(Uuid::new_v4()),
        topic: Set(topic.to_string()),
        payload: Set(payload),
        created_at: NotSet,
        delivered_at: Set(None),
    }
    .insert(conn)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct PendingEvent {
    id: Uuid,
    topic: String,
    payload: Value,
}

/// Deliver a batch of undelivered events. Delivery here is emitting the event
/// to the log; downstream consumers (notifications, chat relay) hang off the
/// same table. Returns how many events were stamped.
pub async fn dispatch_pending(pool: &DbPool) -> AppResult<usize> {
    let events: Vec<PendingEvent> = sqlx::query_as(
        r#"
        SELECT id, topic, payload
        FROM outbox_events
        WHERE delivered_at IS NULL
        ORDER BY created_at
        LIMIT 100
        "#,
    )
    .fetch_all(pool)
    .await?;

    for event in &events {
        tracing::info!(topic = %event.topic, payload = %event.payload, "outbox event delivered");
        sqlx::query("UPDATE outbox_events SET delivered_at = now() WHERE id = $1")
            .bind(event.id)
            .execute(pool)
            .await?;
    }

    Ok(events.len())
}

/// Poll loop spawned from main; failures are logged and retried next tick.
pub async fn run_dispatcher(pool: DbPool, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = dispatch_pending(&pool).await {
            tracing::warn!(error = %err, "outbox dispatch failed");
        }
    }
}
