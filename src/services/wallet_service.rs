use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::wallet::{TopupData, TopupRequest, WalletData},
    entity::{
        wallet_transactions::{
            ActiveModel as TxnActive, Column as TxnCol, Entity as WalletTransactions,
            Model as TxnModel,
        },
        wallets::{ActiveModel as WalletActive, Column as WalletCol, Entity as Wallets, Model as WalletModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{TxnKind, Wallet, WalletTransaction},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Append one immutable ledger row and move the cached balance with it.
///
/// Runs on the caller's transaction; the wallet row is locked (or freshly
/// created) first, which serialises concurrent mutations per wallet. A debit
/// that would push the balance negative fails with `InsufficientFunds` and
/// writes nothing.
pub(crate) async fn ledger_append<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    kind: TxnKind,
    amount: i64,
    description: &str,
    booking_id: Option<Uuid>,
) -> AppResult<(WalletModel, TxnModel)> {
    if amount <= 0 {
        return Err(AppError::InvalidInput("amount must be positive".into()));
    }

    let wallet = Wallets::find()
        .filter(WalletCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(conn)
        .await?;
    let wallet = match wallet {
        Some(w) => w,
        None => find_or_create_wallet(conn, user_id, true).await?,
    };

    let new_balance = match kind {
        TxnKind::Credit => wallet.balance + amount,
        TxnKind::Debit => {
            if wallet.balance < amount {
                return Err(AppError::InsufficientFunds);
            }
            wallet.balance - amount
        }
    };

    let txn_row = TxnActive {
        id: Set(Uuid::new_v4()),
        wallet_id: Set(wallet.id),
        kind: Set(kind.as_str().to_string()),
        amount: Set(amount),
        description: Set(description.to_string()),
        booking_id: Set(booking_id),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut active: WalletActive = wallet.into();
    active.balance = Set(new_balance);
    active.updated_at = Set(Utc::now().into());
    let wallet = active.update(conn).await?;

    Ok((wallet, txn_row))
}

/// First write for a user creates the wallet row. Two concurrent first
/// writes race the insert; `ON CONFLICT DO NOTHING` keeps the loser alive
/// and the re-select picks up whichever row won.
async fn find_or_create_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    for_update: bool,
) -> AppResult<WalletModel> {
    Wallets::insert(WalletActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        balance: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .on_conflict(OnConflict::column(WalletCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    let mut finder = Wallets::find().filter(WalletCol::UserId.eq(user_id));
    if for_update {
        finder = finder.lock(LockType::Update);
    }
    finder
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("wallet row missing after insert")))
}

pub async fn get_wallet(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WalletData>> {
    let wallet = Wallets::find()
        .filter(WalletCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let wallet = match wallet {
        Some(w) => w,
        None => find_or_create_wallet(&state.orm, user.user_id, false).await?,
    };

    let (page, limit, offset) = pagination.normalize();
    let finder = WalletTransactions::find().filter(TxnCol::WalletId.eq(wallet.id));
    let total = finder.clone().count(&state.orm).await? as i64;
    let transactions = finder
        .order_by_desc(TxnCol::CreatedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(txn_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let data = WalletData {
        wallet: wallet_from_entity(wallet),
        transactions,
    };
    Ok(ApiResponse::success(
        "OK",
        data,
        Some(Meta::new(page, limit, total)),
    ))
}

/// Admin top-up: a plain ledger credit in its own transaction.
pub async fn topup(
    state: &AppState,
    user: &AuthUser,
    payload: TopupRequest,
) -> AppResult<ApiResponse<TopupData>> {
    ensure_admin(user)?;

    let description = match payload.reference.as_deref().filter(|r| !r.is_empty()) {
        Some(reference) => format!("topup ({reference})"),
        None => "topup".to_string(),
    };

    let txn = state.orm.begin().await?;
    let (wallet, row) = ledger_append(
        &txn,
        payload.user_id,
        TxnKind::Credit,
        payload.amount,
        &description,
        None,
    )
    .await?;
    txn.commit().await?;

    tracing::info!(user_id = %payload.user_id, amount = payload.amount, "wallet topped up");

    Ok(ApiResponse::success(
        "Wallet credited",
        TopupData {
            transaction_id: row.id,
            balance: wallet.balance,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn wallet_from_entity(model: WalletModel) -> Wallet {
    Wallet {
        id: model.id,
        user_id: model.user_id,
        balance: model.balance,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn txn_from_entity(model: TxnModel) -> AppResult<WalletTransaction> {
    let kind = TxnKind::parse(&model.kind)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown ledger kind: {}", model.kind)))?;
    Ok(WalletTransaction {
        id: model.id,
        wallet_id: model.wallet_id,
        kind,
        amount: model.amount,
        description: model.description,
        booking_id: model.booking_id,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
