//! Loan routes: application, guarantees, decisions, disbursement, repayment.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::loan::{
    ApplyLoanRequest, Loan, LoanDetail, RejectLoanRequest, RepayLoanRequest,
    RespondGuaranteeRequest,
};
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Apply for a loan.
///
/// POST /api/v1/groups/:group_id/loans
///
/// Guarantors are asked to pledge; each gets a notification.
pub async fn apply(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<ApplyLoanRequest>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state
        .loans
        .apply(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(loan).with_message("Loan application submitted"))
}

/// List a group's loans.
///
/// GET /api/v1/groups/:group_id/loans
pub async fn list_loans(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<Loan>>, ApiError> {
    let page = PageParams::from(query);
    let (loans, total) = state
        .loans
        .list(group_id, user_auth.user_id, page)
        .await?;
    Ok(ApiResponse::page(loans, page, total))
}

/// Loan with its guarantees.
///
/// GET /api/v1/loans/:loan_id
pub async fn get_loan(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(loan_id): Path<Uuid>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    Ok(ApiResponse::ok(
        state.loans.get(loan_id, user_auth.user_id).await?,
    ))
}

/// Guarantor approves or declines a pledge.
///
/// POST /api/v1/guarantees/:guarantee_id/respond
pub async fn respond_guarantee(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(guarantee_id): Path<Uuid>,
    Json(request): Json<RespondGuaranteeRequest>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state
        .loans
        .respond_guarantee(guarantee_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(loan))
}

/// POST /api/v1/loans/:loan_id/approve
pub async fn approve(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(loan_id): Path<Uuid>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state.loans.approve(loan_id, user_auth.user_id).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan approved"))
}

/// POST /api/v1/loans/:loan_id/reject
pub async fn reject(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<RejectLoanRequest>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state
        .loans
        .reject(loan_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(loan).with_message("Loan rejected"))
}

/// Move the principal from the group wallet to the borrower.
///
/// POST /api/v1/loans/:loan_id/disburse
pub async fn disburse(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(loan_id): Path<Uuid>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state.loans.disburse(loan_id, user_auth.user_id).await?;
    Ok(ApiResponse::ok(loan).with_message("Loan disbursed"))
}

/// Borrower repays part or all of the outstanding balance.
///
/// POST /api/v1/loans/:loan_id/repayments
pub async fn repay(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(loan_id): Path<Uuid>,
    Json(request): Json<RepayLoanRequest>,
) -> Result<ApiResponse<LoanDetail>, ApiError> {
    let loan = state
        .loans
        .repay(loan_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(loan).with_message("Repayment recorded"))
}
