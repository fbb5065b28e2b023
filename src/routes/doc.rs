use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        availability::{AvailabilityData, AvailabilityQuery},
        bookings::{
            BookingList, BookingWithServices, CancelBookingRequest, CancelOutcome,
            CreateBookingRequest, ExternalPaymentPayload, FeedbackRequest,
        },
        shops::{CloseDateData, CloseDateRequest, ServiceList},
        wallet::{TopupData, TopupRequest, WalletData},
    },
    models::{
        Booking, BookingServiceLine, BookingStatus, BusinessHours, Feedback, PaymentMethod,
        PaymentStatus, Service, Shop, SpecialClosingDay, TxnKind, Wallet, WalletTransaction,
    },
    response::{ApiResponse, ErrorBody, Meta},
    routes::{availability, bookings, health, params, shops, wallet},
    scheduling::{SlotAvailability, SlotUnavailableReason},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        availability::available_slots,
        shops::list_services,
        shops::close_date,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::cancel_booking,
        bookings::complete_booking,
        bookings::create_feedback,
        wallet::get_wallet,
        wallet::topup
    ),
    components(
        schemas(
            Shop,
            BusinessHours,
            SpecialClosingDay,
            Service,
            Booking,
            BookingServiceLine,
            BookingStatus,
            PaymentStatus,
            PaymentMethod,
            TxnKind,
            Wallet,
            WalletTransaction,
            Feedback,
            SlotAvailability,
            SlotUnavailableReason,
            AvailabilityQuery,
            AvailabilityData,
            CreateBookingRequest,
            ExternalPaymentPayload,
            CancelBookingRequest,
            CancelOutcome,
            FeedbackRequest,
            BookingList,
            BookingWithServices,
            ServiceList,
            CloseDateRequest,
            CloseDateData,
            WalletData,
            TopupRequest,
            TopupData,
            params::Pagination,
            params::BookingListQuery,
            Meta,
            ErrorBody,
            ApiResponse<AvailabilityData>,
            ApiResponse<BookingWithServices>,
            ApiResponse<BookingList>,
            ApiResponse<CancelOutcome>,
            ApiResponse<WalletData>,
            ApiResponse<TopupData>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Availability", description = "Slot availability"),
        (name = "Shops", description = "Shop catalogue and closures"),
        (name = "Bookings", description = "Booking lifecycle"),
        (name = "Wallet", description = "Wallet ledger"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
