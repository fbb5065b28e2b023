use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Wallet, WalletTransaction};

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletData {
    pub wallet: Wallet,
    pub transactions: Vec<WalletTransaction>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TopupRequest {
    pub user_id: Uuid,
    /// Minor currency units; must be positive.
    pub amount: i64,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopupData {
    pub transaction_id: Uuid,
    pub balance: i64,
}
