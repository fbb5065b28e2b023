use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Service, SpecialClosingDay};

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceList {
    pub items: Vec<Service>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CloseDateRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CloseDateData {
    pub closing: SpecialClosingDay,
    /// Bookings force-cancelled (and refunded where paid) by the closure.
    pub cancelled_booking_ids: Vec<Uuid>,
}
