use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::hhmm;
use crate::scheduling::SlotAvailability;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    /// Comma-separated service ids.
    pub service_ids: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityData {
    pub date: NaiveDate,
    pub open: bool,
    pub closed_reason: Option<String>,
    #[serde(with = "hhmm::option")]
    #[schema(value_type = Option<String>, example = "09:00")]
    pub opening_time: Option<NaiveTime>,
    #[serde(with = "hhmm::option")]
    #[schema(value_type = Option<String>, example = "18:00")]
    pub closing_time: Option<NaiveTime>,
    pub slot_minutes: i32,
    pub total_duration_minutes: i64,
    pub slots: Vec<SlotAvailability>,
}
