use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// References handed back by the external payment gateway after capture.
#[derive(Debug, Clone)]
pub struct ExternalPaymentRefs {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Verify the gateway's capture signature:
/// `HMAC-SHA256(secret, "<order_id>|<payment_id>")`, hex-encoded.
/// Comparison runs in constant time via `Mac::verify_slice`.
pub fn verify_signature(secret: &str, refs: &ExternalPaymentRefs) -> AppResult<()> {
    if secret.is_empty() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "PAYMENT_SECRET is not set"
        )));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::PaymentVerificationFailed)?;
    mac.update(format!("{}|{}", refs.order_id, refs.payment_id).as_bytes());

    let provided =
        hex::decode(refs.signature.trim()).map_err(|_| AppError::PaymentVerificationFailed)?;
    mac.verify_slice(&provided)
        .map_err(|_| AppError::PaymentVerificationFailed)
}
