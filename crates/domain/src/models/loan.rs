//! Loan and guarantee domain models with their state machines.

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use shared::validation::{round_money, validate_money, validate_rate};

/// Minimum number of distinct guarantors on an application.
pub const MIN_GUARANTORS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    GuarantorsApproved,
    GuarantorsDeclined,
    Approved,
    Rejected,
    Disbursed,
    Active,
    Settled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::GuarantorsApproved => "guarantors_approved",
            LoanStatus::GuarantorsDeclined => "guarantors_declined",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Disbursed => "disbursed",
            LoanStatus::Active => "active",
            LoanStatus::Settled => "settled",
        }
    }

    /// Whether the loan may move directly to `next`.
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, GuarantorsApproved)
                | (Pending, GuarantorsDeclined)
                | (Pending, Approved)
                | (GuarantorsApproved, Approved)
                | (Pending, Rejected)
                | (GuarantorsApproved, Rejected)
                | (GuarantorsDeclined, Rejected)
                | (Approved, Disbursed)
                | (Disbursed, Active)
                | (Disbursed, Settled)
                | (Active, Settled)
        )
    }

    /// Validated transition, failing with the loan-specific error.
    pub fn transition(self, next: LoanStatus) -> EngineResult<LoanStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidLoanTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Disbursed and active loans accept repayments.
    pub fn accepts_repayment(self) -> bool {
        matches!(self, LoanStatus::Disbursed | LoanStatus::Active)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guarantee_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeStatus {
    Pending,
    Accepted,
    Declined,
}

impl GuaranteeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GuaranteeStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeAction {
    Accept,
    Decline,
}

impl GuaranteeAction {
    pub fn target_status(self) -> GuaranteeStatus {
        match self {
            GuaranteeAction::Accept => GuaranteeStatus::Accepted,
            GuaranteeAction::Decline => GuaranteeStatus::Declined,
        }
    }
}

/// Loan application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Loan {
    pub id: Uuid,
    pub group_id: Uuid,
    pub borrower_id: Uuid,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration_months: i32,
    pub purpose: String,
    pub required_guarantors: i32,
    pub approved_guarantors: i32,
    pub status: LoanStatus,
    pub total_amount: Decimal,
    pub remaining_amount: Decimal,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A guarantor's pledge on a loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Guarantee {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub guarantor_id: Uuid,
    pub pledged_amount: Decimal,
    pub status: GuaranteeStatus,
    pub response_note: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request payload for a loan application.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ApplyLoanRequest {
    #[validate(custom(function = "validate_money"))]
    pub amount: Decimal,

    #[validate(custom(function = "validate_rate"))]
    pub interest_rate: Decimal,

    #[validate(range(
        min = 1,
        max = 60,
        message = "Repayment period must be between 1 and 60 months"
    ))]
    pub duration_months: i32,

    #[validate(length(
        min = 1,
        max = 500,
        message = "Purpose must be between 1 and 500 characters"
    ))]
    pub purpose: String,

    pub guarantor_ids: Vec<Uuid>,
}

/// Guarantor response payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RespondGuaranteeRequest {
    pub action: GuaranteeAction,

    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RejectLoanRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "Reason must be between 1 and 500 characters"
    ))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RepayLoanRequest {
    #[validate(custom(function = "validate_money"))]
    pub amount: Decimal,
}

/// Loan with its guarantees.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoanDetail {
    #[serde(flatten)]
    pub loan: Loan,
    pub guarantees: Vec<Guarantee>,
}

/// Checks guarantor ids: at least [`MIN_GUARANTORS`], distinct, and never the borrower.
/// Membership of each guarantor is checked by the caller against the store.
pub fn validate_guarantors(borrower: Uuid, guarantors: &[Uuid]) -> EngineResult<()> {
    let distinct: HashSet<&Uuid> = guarantors.iter().collect();
    if distinct.len() != guarantors.len() {
        return Err(EngineError::Validation(
            "Guarantors must be distinct".into(),
        ));
    }
    if distinct.contains(&borrower) {
        return Err(EngineError::Validation(
            "Borrower cannot guarantee their own loan".into(),
        ));
    }
    if distinct.len() < MIN_GUARANTORS {
        return Err(EngineError::TooFewGuarantors {
            minimum: MIN_GUARANTORS,
            provided: distinct.len(),
        });
    }
    Ok(())
}

/// Derived monetary terms of a new loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub total_amount: Decimal,
    pub pledge_per_guarantor: Decimal,
    pub due_date: DateTime<Utc>,
}

pub fn loan_terms(
    amount: Decimal,
    interest_rate: Decimal,
    duration_months: i32,
    guarantors: usize,
    now: DateTime<Utc>,
) -> EngineResult<LoanTerms> {
    if guarantors == 0 {
        return Err(EngineError::TooFewGuarantors {
            minimum: MIN_GUARANTORS,
            provided: 0,
        });
    }
    let months = u32::try_from(duration_months)
        .map_err(|_| EngineError::Validation("Invalid repayment period".into()))?;
    let due_date = now
        .checked_add_months(Months::new(months))
        .ok_or_else(|| EngineError::Validation("Repayment period out of range".into()))?;

    Ok(LoanTerms {
        total_amount: round_money(amount * (Decimal::ONE + interest_rate)),
        pledge_per_guarantor: round_money(amount / Decimal::from(guarantors as u64)),
        due_date,
    })
}

/// Aggregate guarantor evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuarantorTally {
    pub accepted: i32,
    /// The status the loan moves to, if any.
    pub next_status: Option<LoanStatus>,
}

/// Any decline wins; otherwise all accepted moves the loan on. Only a pending
/// loan is moved; later states keep their status but still get the count.
pub fn evaluate_guarantees(current: LoanStatus, statuses: &[GuaranteeStatus]) -> GuarantorTally {
    let accepted = statuses
        .iter()
        .filter(|s| **s == GuaranteeStatus::Accepted)
        .count() as i32;
    let any_declined = statuses.iter().any(|s| *s == GuaranteeStatus::Declined);
    let all_accepted = !statuses.is_empty() && accepted as usize == statuses.len();

    let target = if any_declined {
        Some(LoanStatus::GuarantorsDeclined)
    } else if all_accepted {
        Some(LoanStatus::GuarantorsApproved)
    } else {
        None
    };

    GuarantorTally {
        accepted,
        next_status: target.filter(|t| current == LoanStatus::Pending && current.can_transition_to(*t)),
    }
}

/// Status after a repayment of `amount` leaves `remaining`.
pub fn status_after_repayment(current: LoanStatus, remaining: Decimal) -> EngineResult<LoanStatus> {
    if !current.accepts_repayment() {
        return Err(EngineError::InvalidLoanTransition {
            from: current.as_str().to_string(),
            to: LoanStatus::Active.as_str().to_string(),
        });
    }
    if remaining <= Decimal::ZERO {
        current.transition(LoanStatus::Settled)
    } else if current == LoanStatus::Disbursed {
        current.transition(LoanStatus::Active)
    } else {
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_approve_only_from_pending_or_guarantors_approved() {
        assert!(LoanStatus::Pending.transition(LoanStatus::Approved).is_ok());
        assert!(LoanStatus::GuarantorsApproved
            .transition(LoanStatus::Approved)
            .is_ok());
        assert!(matches!(
            LoanStatus::GuarantorsDeclined.transition(LoanStatus::Approved),
            Err(EngineError::InvalidLoanTransition { .. })
        ));
        assert!(LoanStatus::Rejected.transition(LoanStatus::Approved).is_err());
    }

    #[test]
    fn test_reject_not_allowed_after_approval() {
        assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Rejected));
        assert!(LoanStatus::GuarantorsDeclined.can_transition_to(LoanStatus::Rejected));
        assert!(!LoanStatus::Approved.can_transition_to(LoanStatus::Rejected));
        assert!(!LoanStatus::Disbursed.can_transition_to(LoanStatus::Rejected));
        assert!(!LoanStatus::Settled.can_transition_to(LoanStatus::Rejected));
    }

    #[test]
    fn test_disburse_only_from_approved() {
        assert!(LoanStatus::Approved.can_transition_to(LoanStatus::Disbursed));
        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Disbursed));
        assert!(!LoanStatus::GuarantorsApproved.can_transition_to(LoanStatus::Disbursed));
    }

    #[test]
    fn test_guarantor_validation() {
        let borrower = Uuid::new_v4();
        let g1 = Uuid::new_v4();
        let g2 = Uuid::new_v4();

        assert!(validate_guarantors(borrower, &[g1, g2]).is_ok());
        assert!(matches!(
            validate_guarantors(borrower, &[g1]),
            Err(EngineError::TooFewGuarantors {
                minimum: 2,
                provided: 1
            })
        ));
        assert!(validate_guarantors(borrower, &[g1, g1]).is_err());
        assert!(validate_guarantors(borrower, &[g1, borrower]).is_err());
    }

    #[test]
    fn test_loan_terms() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let terms = loan_terms(dec!(30000), dec!(0.10), 6, 3, now).unwrap();
        assert_eq!(terms.total_amount, dec!(33000.00));
        assert_eq!(terms.pledge_per_guarantor, dec!(10000.00));
        assert_eq!(
            terms.due_date,
            Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_pledge_rounds_to_cents() {
        let terms = loan_terms(dec!(1000), dec!(0), 1, 3, Utc::now()).unwrap();
        assert_eq!(terms.pledge_per_guarantor, dec!(333.33));
    }

    #[test]
    fn test_partial_acceptance_leaves_loan_pending() {
        use GuaranteeStatus::*;
        let tally = evaluate_guarantees(LoanStatus::Pending, &[Accepted, Accepted, Pending]);
        assert_eq!(tally.accepted, 2);
        assert_eq!(tally.next_status, None);
    }

    #[test]
    fn test_any_decline_declines_loan() {
        use GuaranteeStatus::*;
        let tally = evaluate_guarantees(LoanStatus::Pending, &[Accepted, Accepted, Declined]);
        assert_eq!(tally.accepted, 2);
        assert_eq!(tally.next_status, Some(LoanStatus::GuarantorsDeclined));
    }

    #[test]
    fn test_all_accepted_approves_guarantors() {
        use GuaranteeStatus::*;
        let tally = evaluate_guarantees(LoanStatus::Pending, &[Accepted, Accepted]);
        assert_eq!(tally.accepted, 2);
        assert_eq!(tally.next_status, Some(LoanStatus::GuarantorsApproved));
    }

    #[test]
    fn test_evaluation_does_not_move_decided_loans() {
        use GuaranteeStatus::*;
        let tally = evaluate_guarantees(LoanStatus::Approved, &[Accepted, Declined]);
        assert_eq!(tally.accepted, 1);
        assert_eq!(tally.next_status, None);
    }

    #[test]
    fn test_guarantee_terminal_states() {
        assert!(!GuaranteeStatus::Pending.is_terminal());
        assert!(GuaranteeStatus::Accepted.is_terminal());
        assert!(GuaranteeStatus::Declined.is_terminal());
    }

    #[test]
    fn test_repayment_status() {
        assert_eq!(
            status_after_repayment(LoanStatus::Disbursed, dec!(100)).unwrap(),
            LoanStatus::Active
        );
        assert_eq!(
            status_after_repayment(LoanStatus::Active, dec!(50)).unwrap(),
            LoanStatus::Active
        );
        assert_eq!(
            status_after_repayment(LoanStatus::Active, dec!(0)).unwrap(),
            LoanStatus::Settled
        );
        assert_eq!(
            status_after_repayment(LoanStatus::Disbursed, dec!(0)).unwrap(),
            LoanStatus::Settled
        );
        assert!(status_after_repayment(LoanStatus::Approved, dec!(0)).is_err());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&LoanStatus::GuarantorsApproved).unwrap(),
            "\"guarantors_approved\""
        );
    }
}
