//! Wallet and ledger entry entities.

use chrono::{DateTime, Utc};
use domain::models::wallet::{
    LedgerEntry, PaymentMethod, TransactionStatus, TransactionType, Wallet, WalletKind,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct WalletEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: WalletKind,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletEntity> for Wallet {
    fn from(entity: WalletEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            kind: entity.kind,
            balance: entity.balance,
            currency: entity.currency,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the transactions table.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntryEntity {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub external_reference: Option<String>,
    pub initiator_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const LEDGER_ENTRY_COLUMNS: &str = "id, transaction_type, amount, currency, status, \
    payment_method, external_reference, initiator_id, recipient_id, group_id, description, \
    metadata, created_at, updated_at";

impl From<LedgerEntryEntity> for LedgerEntry {
    fn from(entity: LedgerEntryEntity) -> Self {
        Self {
            id: entity.id,
            transaction_type: entity.transaction_type,
            amount: entity.amount,
            currency: entity.currency,
            status: entity.status,
            payment_method: entity.payment_method,
            external_reference: entity.external_reference,
            initiator_id: entity.initiator_id,
            recipient_id: entity.recipient_id,
            group_id: entity.group_id,
            description: entity.description,
            metadata: entity.metadata,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
