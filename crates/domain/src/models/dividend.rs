//! Dividend declarations, payments and share holdings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use shared::validation::{floor_money, round_money, validate_money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dividend_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DividendStatus {
    Draft,
    Approved,
    Processing,
    Paid,
}

impl DividendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DividendStatus::Draft => "draft",
            DividendStatus::Approved => "approved",
            DividendStatus::Processing => "processing",
            DividendStatus::Paid => "paid",
        }
    }

    /// `processing` re-enters itself so an aborted pass can be resumed.
    pub fn transition(self, next: DividendStatus) -> EngineResult<DividendStatus> {
        use DividendStatus::*;
        let allowed = matches!(
            (self, next),
            (Draft, Approved) | (Approved, Processing) | (Processing, Processing) | (Processing, Paid)
        );
        if allowed {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dividend_payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dividend_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DividendType {
    Interim,
    Final,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Active,
    Frozen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DividendDeclaration {
    pub id: Uuid,
    pub group_id: Uuid,
    pub dividend_type: DividendType,
    pub total_amount: Decimal,
    pub per_share_amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub status: DividendStatus,
    pub declared_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DividendPayment {
    pub id: Uuid,
    pub declaration_id: Uuid,
    pub member_id: Uuid,
    pub shares: i64,
    pub per_share_amount: Decimal,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub transaction_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShareHolding {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub shares_owned: i64,
    pub status: ShareStatus,
    pub updated_at: DateTime<Utc>,
}

/// Exactly one of `total_amount` and `per_share_amount` must be given.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct DeclareDividendRequest {
    #[serde(default = "default_dividend_type")]
    pub dividend_type: DividendType,

    #[validate(custom(function = "validate_money"))]
    pub total_amount: Option<Decimal>,

    #[validate(custom(function = "validate_money"))]
    pub per_share_amount: Option<Decimal>,

    pub payment_date: DateTime<Utc>,
}

fn default_dividend_type() -> DividendType {
    DividendType::Final
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SetShareHoldingRequest {
    #[validate(range(min = 0, message = "Shares cannot be negative"))]
    pub shares_owned: i64,
    pub status: Option<ShareStatus>,
}

/// Resolves the declared amounts into `(total, per_share)`.
///
/// From a total, the per-share figure is rounded down to cents so the fan-out
/// never exceeds what was declared; the stored total is then the exact sum.
pub fn resolve_amounts(
    total_amount: Option<Decimal>,
    per_share_amount: Option<Decimal>,
    total_shares: i64,
) -> EngineResult<(Decimal, Decimal)> {
    match (total_amount, per_share_amount) {
        (Some(_), Some(_)) => Err(EngineError::Validation(
            "Provide either total_amount or per_share_amount, not both".into(),
        )),
        (None, None) => Err(EngineError::MissingRequiredField(
            "total_amount or per_share_amount".into(),
        )),
        (None, Some(per_share)) => Ok((
            round_money(per_share * Decimal::from(total_shares)),
            per_share,
        )),
        (Some(total), None) => {
            if total_shares <= 0 {
                return Err(EngineError::Validation(
                    "Group has no shareholders".into(),
                ));
            }
            let per_share = floor_money(total / Decimal::from(total_shares));
            if per_share <= Decimal::ZERO {
                return Err(EngineError::InvalidAmount(
                    "Total is too small to pay at least 0.01 per share".into(),
                ));
            }
            Ok((round_money(per_share * Decimal::from(total_shares)), per_share))
        }
    }
}

/// Payment amount for one shareholder.
pub fn payment_amount(shares: i64, per_share_amount: Decimal) -> Decimal {
    round_money(Decimal::from(shares) * per_share_amount)
}

/// Payment rows to create on approval: holders with a positive share count.
pub fn fan_out(holdings: &[ShareHolding], per_share_amount: Decimal) -> Vec<(Uuid, i64, Decimal)> {
    holdings
        .iter()
        .filter(|h| h.shares_owned > 0 && h.status == ShareStatus::Active)
        .map(|h| {
            (
                h.member_id,
                h.shares_owned,
                payment_amount(h.shares_owned, per_share_amount),
            )
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DividendProcessingSummary {
    pub declaration: DividendDeclaration,
    pub payments_paid: usize,
    pub amount_paid: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn holding(member: Uuid, shares: i64) -> ShareHolding {
        ShareHolding {
            group_id: Uuid::nil(),
            member_id: member,
            shares_owned: shares,
            status: ShareStatus::Active,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fan_out_amounts() {
        let (m1, m2, m3, m4) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let holdings = [
            holding(m1, 100),
            holding(m2, 50),
            holding(m3, 200),
            holding(m4, 0),
        ];
        let rows = fan_out(&holdings, dec!(10));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], (m1, 100, dec!(1000)));
        assert_eq!(rows[1], (m2, 50, dec!(500)));
        assert_eq!(rows[2], (m3, 200, dec!(2000)));
        let total: Decimal = rows.iter().map(|r| r.2).sum();
        assert_eq!(total, dec!(3500));
    }

    #[test]
    fn test_frozen_holdings_are_skipped() {
        let mut h = holding(Uuid::new_v4(), 10);
        h.status = ShareStatus::Frozen;
        assert!(fan_out(&[h], dec!(5)).is_empty());
    }

    #[test]
    fn test_resolve_from_per_share() {
        assert_eq!(
            resolve_amounts(None, Some(dec!(10)), 350).unwrap(),
            (dec!(3500), dec!(10))
        );
    }

    #[test]
    fn test_resolve_from_total_rounds_down() {
        let (total, per_share) = resolve_amounts(Some(dec!(1000)), None, 3).unwrap();
        assert_eq!(per_share, dec!(333.33));
        assert_eq!(total, dec!(999.99));
    }

    #[test]
    fn test_resolve_requires_exactly_one() {
        assert!(matches!(
            resolve_amounts(None, None, 10),
            Err(EngineError::MissingRequiredField(_))
        ));
        assert!(resolve_amounts(Some(dec!(1)), Some(dec!(1)), 10).is_err());
        assert!(resolve_amounts(Some(dec!(100)), None, 0).is_err());
    }

    #[test]
    fn test_status_transitions() {
        use DividendStatus::*;
        assert!(Draft.transition(Approved).is_ok());
        assert!(Approved.transition(Processing).is_ok());
        assert!(Processing.transition(Paid).is_ok());
        assert!(Processing.transition(Processing).is_ok());
        assert!(Draft.transition(Processing).is_err());
        assert!(Paid.transition(Processing).is_err());
        assert!(Approved.transition(Approved).is_err());
    }
}
