//! Typed failures surfaced by the group financial engine.

use rust_decimal::Decimal;
use thiserror::Error;

/// Broad category of an [`EngineError`], used by the HTTP layer to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    Validation,
    Precondition,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    // Authorization
    #[error("Authentication required")]
    Unauthenticated,

    #[error("You are not an active member of this group")]
    NotAMember,

    #[error("Your role does not allow this action: {0}")]
    InsufficientRole(String),

    // Validation
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid payment method: {0}")]
    InvalidPaymentMethod(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Loan cannot move from {from} to {to}")]
    InvalidLoanTransition { from: String, to: String },

    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    #[error("Amount {actual} does not match the required {expected}")]
    AmountMismatch { expected: Decimal, actual: Decimal },

    #[error("At least {minimum} distinct guarantors are required, got {provided}")]
    TooFewGuarantors { minimum: usize, provided: usize },

    #[error("Guarantor {0} is not an active member of this group")]
    GuarantorNotMember(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // Precondition
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("Insufficient group funds: available {available}, required {required}")]
    InsufficientGroupFunds { available: Decimal, required: Decimal },

    #[error("No active rotating payout cycle for this group")]
    NoActiveCycle,

    #[error("You have already contributed for round {round}")]
    DuplicateRoundContribution { round: i32 },

    #[error("Round {round} has closed; the cycle is on round {current_round}")]
    RoundClosed { round: i32, current_round: i32 },

    #[error("This guarantee has already been responded to")]
    AlreadyResponded,

    #[error("Attendance must be recorded before the meeting can end")]
    AttendanceRequired,

    #[error("Group is not active")]
    GroupInactive,

    #[error("Group has reached its member limit of {0}")]
    GroupFull(i32),

    // Not found
    #[error("Group not found")]
    GroupNotFound,

    #[error("Loan not found")]
    LoanNotFound,

    #[error("Guarantee not found")]
    GuaranteeNotFound,

    #[error("Rotating payout cycle not found")]
    CycleNotFound,

    #[error("Meeting not found")]
    MeetingNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Dividend declaration not found")]
    DeclarationNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Wallet not found")]
    WalletMissing,

    // Conflict
    #[error("Resource already exists: {0}")]
    UniqueConstraintViolation(String),

    #[error("Concurrent modification detected, please retry")]
    ConcurrencyConflict,

    // Internal
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("External service unavailable: {0}")]
    ExternalCollaboratorUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Only lock/serialization conflicts are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict)
    }

    pub fn category(&self) -> ErrorCategory {
        use EngineError::*;
        match self {
            Unauthenticated | NotAMember | InsufficientRole(_) => ErrorCategory::Authorization,
            InvalidAmount(_)
            | InvalidPaymentMethod(_)
            | InvalidTransition { .. }
            | InvalidLoanTransition { .. }
            | MissingRequiredField(_)
            | AmountMismatch { .. }
            | TooFewGuarantors { .. }
            | GuarantorNotMember(_)
            | Validation(_) => ErrorCategory::Validation,
            InsufficientFunds { .. }
            | InsufficientGroupFunds { .. }
            | NoActiveCycle
            | DuplicateRoundContribution { .. }
            | RoundClosed { .. }
            | AlreadyResponded
            | AttendanceRequired
            | GroupInactive
            | GroupFull(_) => ErrorCategory::Precondition,
            GroupNotFound
            | LoanNotFound
            | GuaranteeNotFound
            | CycleNotFound
            | MeetingNotFound
            | InvitationNotFound
            | DeclarationNotFound
            | TransactionNotFound
            | NotificationNotFound
            | WalletMissing => ErrorCategory::NotFound,
            UniqueConstraintViolation(_) | ConcurrencyConflict => ErrorCategory::Conflict,
            StorageUnavailable(_) | ExternalCollaboratorUnavailable(_) | Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        use EngineError::*;
        match self {
            Unauthenticated => "unauthenticated",
            NotAMember => "not_a_member",
            InsufficientRole(_) => "insufficient_role",
            InvalidAmount(_) => "invalid_amount",
            InvalidPaymentMethod(_) => "invalid_payment_method",
            InvalidTransition { .. } => "invalid_transition",
            InvalidLoanTransition { .. } => "invalid_loan_transition",
            MissingRequiredField(_) => "missing_required_field",
            AmountMismatch { .. } => "amount_mismatch",
            TooFewGuarantors { .. } => "too_few_guarantors",
            GuarantorNotMember(_) => "guarantor_not_member",
            Validation(_) => "validation_error",
            InsufficientFunds { .. } => "insufficient_funds",
            InsufficientGroupFunds { .. } => "insufficient_group_funds",
            NoActiveCycle => "no_active_cycle",
            DuplicateRoundContribution { .. } => "duplicate_round_contribution",
            RoundClosed { .. } => "round_closed",
            AlreadyResponded => "already_responded",
            AttendanceRequired => "attendance_required",
            GroupInactive => "group_inactive",
            GroupFull(_) => "group_full",
            GroupNotFound => "group_not_found",
            LoanNotFound => "loan_not_found",
            GuaranteeNotFound => "guarantee_not_found",
            CycleNotFound => "cycle_not_found",
            MeetingNotFound => "meeting_not_found",
            InvitationNotFound => "invitation_not_found",
            DeclarationNotFound => "declaration_not_found",
            TransactionNotFound => "transaction_not_found",
            NotificationNotFound => "notification_not_found",
            WalletMissing => "wallet_missing",
            UniqueConstraintViolation(_) => "unique_constraint_violation",
            ConcurrencyConflict => "concurrency_conflict",
            StorageUnavailable(_) => "storage_unavailable",
            ExternalCollaboratorUnavailable(_) => "external_collaborator_unavailable",
            Internal(_) => "internal_error",
        }
    }

    /// Structured details for the response body, where the caller can act on them.
    pub fn details(&self) -> Option<serde_json::Value> {
        use EngineError::*;
        match self {
            DuplicateRoundContribution { round } => {
                Some(serde_json::json!({ "current_round": round }))
            }
            RoundClosed {
                round,
                current_round,
            } => Some(serde_json::json!({ "round": round, "current_round": current_round })),
            AmountMismatch { expected, actual } => Some(serde_json::json!({
                "expected": expected.to_string(),
                "actual": actual.to_string(),
            })),
            InsufficientFunds {
                available,
                required,
            }
            | InsufficientGroupFunds {
                available,
                required,
            } => Some(serde_json::json!({
                "available": available.to_string(),
                "required": required.to_string(),
            })),
            TooFewGuarantors { minimum, provided } => Some(serde_json::json!({
                "minimum": minimum,
                "provided": provided,
            })),
            InvalidTransition { from, to } | InvalidLoanTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => EngineError::UniqueConstraintViolation(
                    db_err.constraint().unwrap_or("unique").to_string(),
                ),
                Some("40001") | Some("40P01") | Some("55P03") => EngineError::ConcurrencyConflict,
                _ => EngineError::Internal(format!("Database error: {}", db_err)),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                EngineError::StorageUnavailable(err.to_string())
            }
            other => EngineError::Internal(format!("Database error: {}", other)),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_ref().map(|m| m.to_string()).unwrap_or_default()
                    )
                })
            })
            .collect();
        EngineError::Validation(messages.join(", "))
    }
}
