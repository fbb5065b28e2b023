use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Booking, BookingServiceLine, PaymentMethod, WalletTransaction, hhmm};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExternalPaymentPayload {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub shop_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "10:00")]
    pub start: NaiveTime,
    pub service_ids: Vec<Uuid>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    /// Required when `payment_method` is `external`.
    pub external: Option<ExternalPaymentPayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    pub rating: i16,
    pub staff_rating: Option<i16>,
    pub value_rating: Option<i16>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingWithServices {
    pub booking: Booking,
    pub services: Vec<BookingServiceLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<Booking>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelOutcome {
    pub booking: Booking,
    /// The refund credit, when one was issued by this call.
    pub refund: Option<WalletTransaction>,
}
