use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ErrorBody;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Resource is inactive")]
    InactiveResource,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Requested time falls outside business hours")]
    OutsideBusinessHours,

    #[error("Shop is closed on the requested date")]
    ShopClosed,

    #[error("Requested date is in the past")]
    PastDate,

    #[error("Requested slot is in the past")]
    PastSlot,

    #[error("Slot conflicts with an existing booking")]
    SlotConflict,

    #[error("Insufficient wallet balance")]
    InsufficientFunds,

    #[error("Payment signature verification failed")]
    PaymentVerificationFailed,

    #[error("Too late to cancel this booking")]
    CancellationTooLate,

    #[error("Illegal booking state transition")]
    IllegalTransition,

    #[error("Concurrent update, please retry")]
    ConcurrencyConflict,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind for the wire format.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NotFound",
            AppError::InactiveResource => "InactiveResource",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::OutsideBusinessHours => "OutsideBusinessHours",
            AppError::ShopClosed => "ShopClosed",
            AppError::PastDate => "PastDate",
            AppError::PastSlot => "PastSlot",
            AppError::SlotConflict => "SlotConflict",
            AppError::InsufficientFunds => "InsufficientFunds",
            AppError::PaymentVerificationFailed => "PaymentVerificationFailed",
            AppError::CancellationTooLate => "CancellationTooLate",
            AppError::IllegalTransition => "IllegalTransition",
            AppError::ConcurrencyConflict => "ConcurrencyConflict",
            AppError::Forbidden => "Forbidden",
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::SlotConflict | AppError::ConcurrencyConflict => StatusCode::CONFLICT,
            AppError::InvalidInput(_)
            | AppError::InactiveResource
            | AppError::OutsideBusinessHours
            | AppError::ShopClosed
            | AppError::PastDate
            | AppError::PastSlot
            | AppError::InsufficientFunds
            | AppError::PaymentVerificationFailed
            | AppError::CancellationTooLate
            | AppError::IllegalTransition => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }

        let body = ErrorBody {
            success: false,
            code: self.code().to_string(),
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
