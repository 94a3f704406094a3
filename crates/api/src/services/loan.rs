//! Loan workflow: application, guarantor responses, officer decisions,
//! disbursement and repayment.

use chrono::Utc;
use domain::models::group::Membership;
use domain::models::loan::{
    evaluate_guarantees, loan_terms, status_after_repayment, validate_guarantors, ApplyLoanRequest,
    Guarantee, Loan, LoanDetail, LoanStatus, RejectLoanRequest, RepayLoanRequest,
    RespondGuaranteeRequest,
};
use domain::models::wallet::{
    LedgerEntry, NewLedgerEntry, PaymentMethod, TransactionStatus, TransactionType, WalletKind,
};
use domain::services::{authorization, notification};
use domain::{EngineError, EngineResult};
use persistence::repositories::loan as loan_repo;
use persistence::repositories::{group as group_repo, ledger};
use persistence::repositories::{GroupRepository, LoanRepository, NewLoan};
use rust_decimal::Decimal;
use serde_json::json;
use shared::pagination::PageParams;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::engine::{active_group, membership, EngineContext};
use crate::middleware::metrics::record_loan_disbursed;

#[derive(Clone)]
pub struct LoanService {
    ctx: EngineContext,
    loans: LoanRepository,
    groups: GroupRepository,
}

impl LoanService {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            loans: LoanRepository::new(ctx.pool.clone()),
            groups: GroupRepository::new(ctx.pool.clone()),
            ctx,
        }
    }

    pub async fn apply(
        &self,
        group_id: Uuid,
        borrower_id: Uuid,
        request: ApplyLoanRequest,
    ) -> EngineResult<LoanDetail> {
        request.validate()?;
        validate_guarantors(borrower_id, &request.guarantor_ids)?;
        let max = self.ctx.config.limits.max_guarantors;
        if request.guarantor_ids.len() > max {
            return Err(EngineError::Validation(format!(
                "At most {} guarantors are allowed",
                max
            )));
        }

        let detail = self
            .ctx
            .run(|| self.apply_once(group_id, borrower_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            user_id = %borrower_id,
            loan_id = %detail.loan.id,
            amount = %detail.loan.amount,
            guarantors = detail.guarantees.len(),
            "Loan application submitted"
        );
        Ok(detail)
    }

    async fn apply_once(
        &self,
        group_id: Uuid,
        borrower_id: Uuid,
        request: &ApplyLoanRequest,
    ) -> EngineResult<LoanDetail> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        active_group(conn, group_id).await?;
        let borrower = membership(conn, group_id, borrower_id).await?;
        authorization::require_active_member(borrower.as_ref())?;

        let members: HashSet<Uuid> =
            group_repo::find_active_memberships(conn, group_id, &request.guarantor_ids)
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect();
        if let Some(outsider) = request.guarantor_ids.iter().find(|g| !members.contains(g)) {
            return Err(EngineError::GuarantorNotMember(outsider.to_string()));
        }

        let terms = loan_terms(
            request.amount,
            request.interest_rate,
            request.duration_months,
            request.guarantor_ids.len(),
            Utc::now(),
        )?;
        let required_guarantors = i32::try_from(request.guarantor_ids.len())
            .map_err(|_| EngineError::Validation("Too many guarantors".into()))?;

        let loan = Loan::from(
            loan_repo::insert_loan(
                conn,
                &NewLoan {
                    group_id,
                    borrower_id,
                    amount: request.amount,
                    interest_rate: request.interest_rate,
                    duration_months: request.duration_months,
                    purpose: request.purpose.clone(),
                    required_guarantors,
                    total_amount: terms.total_amount,
                    due_date: terms.due_date,
                },
            )
            .await?,
        );

        let mut guarantees = Vec::with_capacity(request.guarantor_ids.len());
        for guarantor in &request.guarantor_ids {
            let row =
                loan_repo::insert_guarantee(conn, loan.id, *guarantor, terms.pledge_per_guarantor)
                    .await?;
            guarantees.push(Guarantee::from(row));
        }

        let notes = guarantees
            .iter()
            .map(|g| notification::guarantee_request(&loan, g))
            .collect();
        self.ctx.notify(&mut uow, notes);
        self.ctx.commit(uow).await?;
        Ok(LoanDetail { loan, guarantees })
    }

    /// Guarantor accepts or declines. The loan's aggregate is recomputed from
    /// every guarantee under the loan row lock.
    pub async fn respond_guarantee(
        &self,
        guarantee_id: Uuid,
        user_id: Uuid,
        request: RespondGuaranteeRequest,
    ) -> EngineResult<LoanDetail> {
        request.validate()?;

        let loan = self
            .ctx
            .run(|| self.respond_once(guarantee_id, user_id, &request))
            .await?;

        info!(
            guarantee_id = %guarantee_id,
            loan_id = %loan.id,
            user_id = %user_id,
            action = ?request.action,
            loan_status = %loan.status,
            approved_guarantors = loan.approved_guarantors,
            "Guarantee response recorded"
        );
        self.with_guarantees(loan).await
    }

    async fn respond_once(
        &self,
        guarantee_id: Uuid,
        user_id: Uuid,
        request: &RespondGuaranteeRequest,
    ) -> EngineResult<Loan> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let guarantee = loan_repo::find_guarantee(conn, guarantee_id)
            .await?
            .map(Guarantee::from)
            .ok_or(EngineError::GuaranteeNotFound)?;
        if guarantee.guarantor_id != user_id {
            return Err(EngineError::InsufficientRole(
                "only the named guarantor can respond".into(),
            ));
        }
        let loan = lock_loan(conn, guarantee.loan_id).await?;
        if guarantee.status.is_terminal() {
            return Err(EngineError::AlreadyResponded);
        }

        let responded = loan_repo::respond_guarantee(
            conn,
            guarantee_id,
            request.action.target_status(),
            request.reason.as_deref(),
        )
        .await?
        .map(Guarantee::from)
        .ok_or(EngineError::AlreadyResponded)?;

        let statuses = loan_repo::guarantee_statuses(conn, loan.id).await?;
        let tally = evaluate_guarantees(loan.status, &statuses);
        let next_status = tally.next_status.unwrap_or(loan.status);
        let loan = Loan::from(
            loan_repo::update_guarantor_tally(conn, loan.id, tally.accepted, next_status).await?,
        );

        self.ctx
            .notify(&mut uow, vec![notification::guarantee_response(&loan, &responded)]);
        self.ctx.commit(uow).await?;
        Ok(loan)
    }

    pub async fn approve(&self, loan_id: Uuid, user_id: Uuid) -> EngineResult<LoanDetail> {
        let loan = self
            .ctx
            .run(|| self.decide_once(loan_id, user_id, None))
            .await?;
        info!(loan_id = %loan.id, group_id = %loan.group_id, user_id = %user_id, "Loan approved");
        self.with_guarantees(loan).await
    }

    pub async fn reject(
        &self,
        loan_id: Uuid,
        user_id: Uuid,
        request: RejectLoanRequest,
    ) -> EngineResult<LoanDetail> {
        request.validate()?;
        let loan = self
            .ctx
            .run(|| self.decide_once(loan_id, user_id, Some(request.reason.as_str())))
            .await?;
        info!(loan_id = %loan.id, group_id = %loan.group_id, user_id = %user_id, "Loan rejected");
        self.with_guarantees(loan).await
    }

    /// Approves when `rejection` is `None`, rejects with the reason otherwise.
    async fn decide_once(
        &self,
        loan_id: Uuid,
        user_id: Uuid,
        rejection: Option<&str>,
    ) -> EngineResult<Loan> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let loan = lock_loan(conn, loan_id).await?;
        let caller = membership(conn, loan.group_id, user_id).await?;
        authorization::require_loan_approver(caller.as_ref())?;

        let row = match rejection {
            None => {
                loan.status.transition(LoanStatus::Approved)?;
                loan_repo::mark_approved(conn, loan.id, user_id).await?
            }
            Some(reason) => {
                loan.status.transition(LoanStatus::Rejected)?;
                loan_repo::mark_rejected(conn, loan.id, user_id, reason).await?
            }
        };
        let loan = Loan::from(row);

        self.ctx
            .notify(&mut uow, vec![notification::loan_decision(&loan)]);
        self.ctx.commit(uow).await?;
        Ok(loan)
    }

    /// Moves the principal from the group wallet to the borrower.
    pub async fn disburse(&self, loan_id: Uuid, user_id: Uuid) -> EngineResult<LoanDetail> {
        let (loan, entry) = self
            .ctx
            .run(|| self.disburse_once(loan_id, user_id))
            .await?;

        record_loan_disbursed();
        info!(
            loan_id = %loan.id,
            group_id = %loan.group_id,
            user_id = %user_id,
            entry_id = %entry.id,
            amount = %entry.amount,
            "Loan disbursed"
        );
        self.with_guarantees(loan).await
    }

    async fn disburse_once(&self, loan_id: Uuid, user_id: Uuid) -> EngineResult<(Loan, LedgerEntry)> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let loan = lock_loan(conn, loan_id).await?;
        let caller = membership(conn, loan.group_id, user_id).await?;
        authorization::require_loan_approver(caller.as_ref())?;
        loan.status.transition(LoanStatus::Disbursed)?;
        let group = active_group(conn, loan.group_id).await?;

        let group_wallet =
            ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?;
        let borrower_wallet = ledger::ensure_wallet(
            conn,
            loan.borrower_id,
            WalletKind::Personal,
            &self.ctx.config.limits.default_currency,
        )
        .await?;
        ledger::lock_wallets(conn, &[group_wallet.id, borrower_wallet.id]).await?;

        let debit = ledger::debit(conn, group_wallet.id, loan.amount)
            .await
            .map_err(|err| match err {
                EngineError::InsufficientFunds {
                    available,
                    required,
                } => EngineError::InsufficientGroupFunds {
                    available,
                    required,
                },
                other => other,
            })?;
        let credit = ledger::credit(conn, borrower_wallet.id, loan.amount).await?;

        let entry = LedgerEntry::from(
            ledger::record_entry(
                conn,
                &NewLedgerEntry {
                    transaction_type: TransactionType::Loan,
                    amount: loan.amount,
                    currency: group.currency.clone(),
                    status: TransactionStatus::Completed,
                    payment_method: PaymentMethod::InternalWallet,
                    external_reference: None,
                    initiator_id: user_id,
                    recipient_id: Some(loan.borrower_id),
                    group_id: Some(group.id),
                    description: Some(format!("Loan disbursement: {}", loan.purpose)),
                    metadata: json!({ "type": "loan_disbursement", "loan_id": loan.id }),
                },
                &[debit, credit],
            )
            .await?,
        );

        let loan = Loan::from(loan_repo::mark_disbursed(conn, loan.id).await?);
        group_repo::mirror_group_funds(conn, group.id).await?;

        self.ctx
            .notify(&mut uow, vec![notification::loan_disbursed(&loan, entry.id)]);
        self.ctx.commit(uow).await?;
        Ok((loan, entry))
    }

    /// Borrower pays back part or all of the remaining balance.
    pub async fn repay(
        &self,
        loan_id: Uuid,
        user_id: Uuid,
        request: RepayLoanRequest,
    ) -> EngineResult<LoanDetail> {
        request.validate()?;
        let (loan, entry) = self
            .ctx
            .run(|| self.repay_once(loan_id, user_id, request.amount))
            .await?;

        info!(
            loan_id = %loan.id,
            group_id = %loan.group_id,
            user_id = %user_id,
            entry_id = %entry.id,
            amount = %entry.amount,
            remaining = %loan.remaining_amount,
            status = %loan.status,
            "Loan repayment recorded"
        );
        self.with_guarantees(loan).await
    }

    async fn repay_once(
        &self,
        loan_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> EngineResult<(Loan, LedgerEntry)> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let loan = lock_loan(conn, loan_id).await?;
        if loan.borrower_id != user_id {
            return Err(EngineError::InsufficientRole(
                "only the borrower can repay this loan".into(),
            ));
        }
        let borrower = membership(conn, loan.group_id, user_id).await?;
        authorization::require_active_member(borrower.as_ref())?;

        if amount > loan.remaining_amount {
            return Err(EngineError::InvalidAmount(format!(
                "Repayment exceeds the remaining balance of {}",
                loan.remaining_amount
            )));
        }
        let remaining = loan.remaining_amount - amount;
        let next_status = status_after_repayment(loan.status, remaining)?;
        let group = active_group(conn, loan.group_id).await?;

        let borrower_wallet = ledger::ensure_wallet(
            conn,
            user_id,
            WalletKind::Personal,
            &self.ctx.config.limits.default_currency,
        )
        .await?;
        let group_wallet =
            ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?;
        ledger::lock_wallets(conn, &[borrower_wallet.id, group_wallet.id]).await?;

        let debit = ledger::debit(conn, borrower_wallet.id, amount).await?;
        let credit = ledger::credit(conn, group_wallet.id, amount).await?;
        let entry = LedgerEntry::from(
            ledger::record_entry(
                conn,
                &NewLedgerEntry {
                    transaction_type: TransactionType::LoanRepayment,
                    amount,
                    currency: group.currency.clone(),
                    status: TransactionStatus::Completed,
                    payment_method: PaymentMethod::InternalWallet,
                    external_reference: None,
                    initiator_id: user_id,
                    recipient_id: None,
                    group_id: Some(group.id),
                    description: None,
                    metadata: json!({ "type": "loan_repayment", "loan_id": loan.id }),
                },
                &[debit, credit],
            )
            .await?,
        );

        let loan = Loan::from(loan_repo::apply_repayment(conn, loan.id, remaining, next_status).await?);
        group_repo::mirror_group_funds(conn, group.id).await?;

        self.ctx.commit(uow).await?;
        Ok((loan, entry))
    }

    /// Loans of a group, newest first. Members only.
    pub async fn list(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        page: PageParams,
    ) -> EngineResult<(Vec<Loan>, i64)> {
        self.require_member(group_id, user_id).await?;
        let loans = self
            .loans
            .list_group_loans(group_id, page.limit, page.offset)
            .await?
            .into_iter()
            .map(Loan::from)
            .collect();
        let total = self.loans.count_group_loans(group_id).await?;
        Ok((loans, total))
    }

    pub async fn get(&self, loan_id: Uuid, user_id: Uuid) -> EngineResult<LoanDetail> {
        let loan = self
            .loans
            .find_by_id(loan_id)
            .await?
            .map(Loan::from)
            .ok_or(EngineError::LoanNotFound)?;
        self.require_member(loan.group_id, user_id).await?;
        self.with_guarantees(loan).await
    }

    async fn require_member(&self, group_id: Uuid, user_id: Uuid) -> EngineResult<()> {
        let caller = self
            .groups
            .find_membership(group_id, user_id)
            .await?
            .map(Membership::from);
        authorization::require_active_member(caller.as_ref())?;
        Ok(())
    }

    async fn with_guarantees(&self, loan: Loan) -> EngineResult<LoanDetail> {
        let guarantees = self
            .loans
            .find_guarantees(loan.id)
            .await?
            .into_iter()
            .map(Guarantee::from)
            .collect();
        Ok(LoanDetail { loan, guarantees })
    }
}

async fn lock_loan(conn: &mut PgConnection, loan_id: Uuid) -> EngineResult<Loan> {
    loan_repo::lock_loan(conn, loan_id)
        .await?
        .map(Loan::from)
        .ok_or(EngineError::LoanNotFound)
}
