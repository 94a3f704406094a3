//! Wallet and ledger entry models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Personal,
    Group,
}

/// A balance holder owned by either a user (personal) or a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: WalletKind,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Contribution,
    Deposit,
    Withdrawal,
    Transfer,
    Loan,
    LoanRepayment,
    Fee,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// The only mutation permitted on a ledger entry is settling a pending one.
    pub fn can_settle_to(self, next: TransactionStatus) -> bool {
        self == TransactionStatus::Pending
            && matches!(
                next,
                TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
            )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    InternalWallet,
    MobileMoney,
    Cash,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::InternalWallet => "internal_wallet",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Cheque => "cheque",
        }
    }

    /// Cash and cheque are recorded by an officer on behalf of a member.
    pub fn is_operator_recorded(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Cheque)
    }

    /// Whether funds are settled synchronously at commit.
    pub fn settles_immediately(&self) -> bool {
        !matches!(self, PaymentMethod::MobileMoney)
    }

    pub fn initial_status(&self) -> TransactionStatus {
        if self.settles_immediately() {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Pending
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed balance change applied to one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub wallet_id: Uuid,
    pub delta: Decimal,
}

impl Posting {
    pub fn credit(wallet_id: Uuid, amount: Decimal) -> Self {
        Self {
            wallet_id,
            delta: amount,
        }
    }

    pub fn debit(wallet_id: Uuid, amount: Decimal) -> Self {
        Self {
            wallet_id,
            delta: -amount,
        }
    }
}

/// Net effect of a set of postings; zero means no money was created or destroyed.
pub fn net_delta(postings: &[Posting]) -> Decimal {
    postings.iter().map(|p| p.delta).sum()
}

/// Append-only ledger entry ("transaction").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LedgerEntry {
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

/// Input for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
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
}

/// Wallet with a short page of recent entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WalletView {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub recent_transactions: Vec<LedgerEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_initial_status_by_method() {
        assert_eq!(
            PaymentMethod::InternalWallet.initial_status(),
            TransactionStatus::Completed
        );
        assert_eq!(
            PaymentMethod::MobileMoney.initial_status(),
            TransactionStatus::Pending
        );
        assert_eq!(PaymentMethod::Cash.initial_status(), TransactionStatus::Completed);
        assert_eq!(
            PaymentMethod::Cheque.initial_status(),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_operator_recorded_methods() {
        assert!(PaymentMethod::Cash.is_operator_recorded());
        assert!(PaymentMethod::Cheque.is_operator_recorded());
        assert!(!PaymentMethod::InternalWallet.is_operator_recorded());
        assert!(!PaymentMethod::MobileMoney.is_operator_recorded());
    }

    #[test]
    fn test_only_pending_settles() {
        assert!(TransactionStatus::Pending.can_settle_to(TransactionStatus::Completed));
        assert!(TransactionStatus::Pending.can_settle_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Pending.can_settle_to(TransactionStatus::Pending));
        assert!(!TransactionStatus::Completed.can_settle_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Failed.can_settle_to(TransactionStatus::Completed));
    }

    #[test]
    fn test_transfer_postings_net_to_zero() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let postings = [Posting::debit(a, dec!(1200)), Posting::credit(b, dec!(1200))];
        assert_eq!(net_delta(&postings), Decimal::ZERO);
    }

    #[test]
    fn test_credit_then_debit_same_wallet_nets_zero() {
        let w = Uuid::new_v4();
        let postings = [Posting::credit(w, dec!(75.50)), Posting::debit(w, dec!(75.50))];
        assert_eq!(net_delta(&postings), Decimal::ZERO);
    }

    #[test]
    fn test_operator_credit_is_one_sided() {
        let g = Uuid::new_v4();
        assert_eq!(net_delta(&[Posting::credit(g, dec!(300))]), dec!(300));
    }

    #[test]
    fn test_payment_method_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MobileMoney).unwrap(),
            "\"mobile_money\""
        );
        let m: PaymentMethod = serde_json::from_str("\"internal_wallet\"").unwrap();
        assert_eq!(m, PaymentMethod::InternalWallet);
    }
}
