//! Contribution pipeline and mobile-money settlement.

use chrono::Utc;
use domain::models::contribution::{
    plan_contribution, CallbackStatus, ContributeRequest, ContributionMetadata,
    ContributionPlan, ContributionResponse, ContributionType, CreditTarget, MobileMoneyCallback,
    RoundContext,
};
use domain::models::group::Group;
use domain::models::notification::NewNotification;
use domain::models::rotating_payout::{AdvanceOutcome, RotatingPayoutCycle};
use domain::models::wallet::{
    LedgerEntry, NewLedgerEntry, PaymentMethod, Posting, TransactionStatus, TransactionType,
    WalletKind,
};
use domain::services::{authorization, notification};
use domain::{EngineError, EngineResult};
use persistence::repositories::{group as group_repo, ledger, rotating_payout as cycle_repo};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::cycle::apply_advance;
use super::engine::{active_group, membership, EngineContext};
use crate::middleware::metrics::{record_contribution, record_round_advanced};

#[derive(Clone)]
pub struct ContributionService {
    ctx: EngineContext,
}

/// The active cycle a rotating contribution belongs to, with its current recipient.
struct OpenRound {
    cycle: RotatingPayoutCycle,
    recipient_id: Uuid,
}

impl OpenRound {
    fn context(&self) -> RoundContext {
        RoundContext {
            cycle_id: self.cycle.id,
            round: self.cycle.current_round,
            recipient_id: self.recipient_id,
        }
    }
}

/// What a completed contribution changed beyond its own entry.
struct Completion {
    group_total_funds: Decimal,
    round: Option<AdvanceOutcome>,
    notes: Vec<NewNotification>,
}

impl ContributionService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn contribute(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: ContributeRequest,
    ) -> EngineResult<ContributionResponse> {
        request.validate()?;

        let result = self
            .ctx
            .run(|| self.contribute_once(group_id, user_id, &request))
            .await;

        let status = match &result {
            Ok(response) => response.transaction.status.to_string(),
            Err(err) => err.code().to_string(),
        };
        record_contribution(
            request.payment_method.as_str(),
            request.contribution_type.as_str(),
            &status,
        );

        let response = result?;
        if matches!(
            response.round,
            Some(AdvanceOutcome::Advanced { .. } | AdvanceOutcome::CycleCompleted)
        ) {
            record_round_advanced();
        }
        info!(
            group_id = %group_id,
            user_id = %user_id,
            entry_id = %response.transaction.id,
            amount = %response.transaction.amount,
            method = %request.payment_method,
            status = %response.transaction.status,
            "Contribution recorded"
        );
        Ok(response)
    }

    async fn contribute_once(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: &ContributeRequest,
    ) -> EngineResult<ContributionResponse> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let group = active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        let caller = authorization::require_active_member(caller.as_ref())?;
        let plan = plan_contribution(
            &group,
            user_id,
            caller.role,
            request,
            self.ctx.config.limits.max_contribution_amount,
        )?;

        if plan.contributor != user_id {
            let member = membership(conn, group_id, plan.contributor).await?;
            if !member.map(|m| m.is_active).unwrap_or(false) {
                return Err(EngineError::Validation(
                    "on_behalf_of_user is not an active member of this group".into(),
                ));
            }
        }

        let open_round = if request.contribution_type == ContributionType::RotatingPayout {
            let round = open_round(conn, group_id, plan.contributor).await?;
            if request.amount != round.cycle.amount_per_round {
                return Err(EngineError::AmountMismatch {
                    expected: round.cycle.amount_per_round,
                    actual: request.amount,
                });
            }
            Some(round)
        } else {
            None
        };

        let postings = self
            .move_funds(conn, &group, &plan, open_round.as_ref(), request.amount)
            .await?;

        let status = request.payment_method.initial_status();
        let metadata =
            ContributionMetadata::new(group_id, request, &plan, open_round.as_ref().map(OpenRound::context));
        let entry = LedgerEntry::from(
            ledger::record_entry(
                conn,
                &NewLedgerEntry {
                    transaction_type: TransactionType::Contribution,
                    amount: request.amount,
                    currency: group.currency.clone(),
                    status,
                    payment_method: request.payment_method,
                    external_reference: request.external_reference.clone(),
                    initiator_id: user_id,
                    recipient_id: open_round.as_ref().map(|r| r.recipient_id),
                    group_id: Some(group_id),
                    description: request.description.clone(),
                    metadata: metadata.to_value(),
                },
                &postings,
            )
            .await?,
        );

        let response = if status == TransactionStatus::Completed {
            let completion = complete(
                conn,
                group_id,
                plan.contributor,
                request.amount,
                entry.id,
                open_round,
            )
            .await?;
            self.ctx.notify(&mut uow, completion.notes);
            ContributionResponse {
                transaction: entry,
                group_total_funds: completion.group_total_funds,
                round: completion.round,
            }
        } else {
            ContributionResponse {
                transaction: entry,
                group_total_funds: group.total_funds,
                round: None,
            }
        };

        self.ctx.commit(uow).await?;
        Ok(response)
    }

    /// Debits and credits for an intake. Wallets are locked in id order first.
    async fn move_funds(
        &self,
        conn: &mut PgConnection,
        group: &Group,
        plan: &ContributionPlan,
        open_round: Option<&OpenRound>,
        amount: Decimal,
    ) -> EngineResult<Vec<Posting>> {
        let currency = &self.ctx.config.limits.default_currency;

        let payer = if plan.debit_initiator {
            Some(ledger::ensure_wallet(conn, plan.contributor, WalletKind::Personal, currency).await?)
        } else {
            None
        };
        let target = match (plan.credit_target, open_round) {
            (CreditTarget::GroupWallet, _) => Some(
                ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?,
            ),
            (CreditTarget::RecipientWallet, Some(round)) => Some(
                ledger::ensure_wallet(conn, round.recipient_id, WalletKind::Personal, currency)
                    .await?,
            ),
            (CreditTarget::RecipientWallet, None) => return Err(EngineError::NoActiveCycle),
            (CreditTarget::Deferred, _) => None,
        };

        let ids: Vec<Uuid> = payer.iter().chain(target.iter()).map(|w| w.id).collect();
        ledger::lock_wallets(conn, &ids).await?;

        let mut postings = Vec::with_capacity(2);
        if let Some(wallet) = &payer {
            postings.push(ledger::debit(conn, wallet.id, amount).await?);
        }
        if let Some(wallet) = &target {
            postings.push(ledger::credit(conn, wallet.id, amount).await?);
        }
        Ok(postings)
    }

    /// Settles a pending mobile-money contribution from a gateway callback.
    ///
    /// Settling an entry that is no longer pending returns it unchanged. A
    /// rotating entry whose round closed before confirmation is marked failed.
    pub async fn confirm_mobile_money(
        &self,
        callback: MobileMoneyCallback,
    ) -> EngineResult<LedgerEntry> {
        callback.validate()?;

        let result = self.ctx.run(|| self.confirm_once(&callback)).await;
        match &result {
            Ok(entry) => info!(
                entry_id = %entry.id,
                external_reference = %callback.external_reference,
                status = %entry.status,
                "Mobile money callback applied"
            ),
            Err(err) => warn!(
                external_reference = %callback.external_reference,
                error = %err,
                "Mobile money callback rejected"
            ),
        }
        result
    }

    async fn confirm_once(&self, callback: &MobileMoneyCallback) -> EngineResult<LedgerEntry> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let entry = ledger::lock_entry_by_reference(conn, &callback.external_reference)
            .await?
            .map(LedgerEntry::from)
            .ok_or(EngineError::TransactionNotFound)?;
        if entry.status != TransactionStatus::Pending {
            return Ok(entry);
        }
        if entry.transaction_type != TransactionType::Contribution
            || entry.payment_method != PaymentMethod::MobileMoney
        {
            return Err(EngineError::Validation(
                "Reference does not belong to a mobile money contribution".into(),
            ));
        }
        let mut metadata = ContributionMetadata::from_value(&entry.metadata)
            .ok_or_else(|| EngineError::Internal("malformed contribution metadata".into()))?;

        if callback.status == CallbackStatus::Failed {
            let failed = settle(conn, &entry, TransactionStatus::Failed, &metadata).await?;
            self.ctx.commit(uow).await?;
            return Ok(failed);
        }

        let group = group_repo::find_group(conn, metadata.group_id)
            .await?
            .map(Group::from)
            .ok_or(EngineError::GroupNotFound)?;

        let open_round = if metadata.contribution_type == ContributionType::RotatingPayout {
            let checked = match open_round(conn, group.id, metadata.contributor_id).await {
                Ok(round) if metadata.cycle_id != Some(round.cycle.id)
                    || metadata.round != Some(round.cycle.current_round) =>
                {
                    Err(EngineError::RoundClosed {
                        round: metadata.round.unwrap_or_default(),
                        current_round: round.cycle.current_round,
                    })
                }
                Ok(round) if round.cycle.amount_per_round != entry.amount => {
                    Err(EngineError::AmountMismatch {
                        expected: round.cycle.amount_per_round,
                        actual: entry.amount,
                    })
                }
                other => other,
            };
            match checked {
                Ok(round) => Some(round),
                Err(err) => {
                    // The payment cannot count toward any round; close it out.
                    settle(conn, &entry, TransactionStatus::Failed, &metadata).await?;
                    self.ctx.commit(uow).await?;
                    return Err(err);
                }
            }
        } else {
            None
        };

        let currency = &self.ctx.config.limits.default_currency;
        let target = match &open_round {
            Some(round) => {
                let context = round.context();
                metadata.cycle_id = Some(context.cycle_id);
                metadata.round = Some(context.round);
                metadata.recipient_id = Some(context.recipient_id);
                ledger::ensure_wallet(conn, round.recipient_id, WalletKind::Personal, currency)
                    .await?
            }
            None => ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?,
        };
        ledger::lock_wallets(conn, &[target.id]).await?;
        let posting = ledger::credit(conn, target.id, entry.amount).await?;

        let settled = settle(conn, &entry, TransactionStatus::Completed, &metadata).await?;
        ledger::attach_postings(conn, settled.id, &[posting]).await?;

        let completion = complete(
            conn,
            group.id,
            metadata.contributor_id,
            entry.amount,
            settled.id,
            open_round,
        )
        .await?;
        self.ctx.notify(&mut uow, completion.notes);
        self.ctx.commit(uow).await?;
        Ok(settled)
    }
}

/// Locks the group's active cycle and checks that `contributor` still owes the current round.
async fn open_round(
    conn: &mut PgConnection,
    group_id: Uuid,
    contributor: Uuid,
) -> EngineResult<OpenRound> {
    let cycle = cycle_repo::lock_active_cycle(conn, group_id)
        .await?
        .map(RotatingPayoutCycle::from)
        .ok_or(EngineError::NoActiveCycle)?;

    if !cycle_repo::is_participant(conn, cycle.id, contributor).await? {
        return Err(EngineError::Validation(
            "Contributor is not a participant in the active cycle".into(),
        ));
    }
    let recipient = cycle_repo::participant_at(conn, cycle.id, cycle.current_round)
        .await?
        .ok_or_else(|| EngineError::Internal("cycle has no participant for its round".into()))?;
    if recipient.user_id == contributor {
        return Err(EngineError::Validation(
            "The current recipient does not contribute to their own round".into(),
        ));
    }
    if cycle_repo::has_contributed(conn, cycle.id, cycle.current_round, contributor).await? {
        return Err(EngineError::DuplicateRoundContribution {
            round: cycle.current_round,
        });
    }

    Ok(OpenRound {
        recipient_id: recipient.user_id,
        cycle,
    })
}

async fn settle(
    conn: &mut PgConnection,
    entry: &LedgerEntry,
    status: TransactionStatus,
    metadata: &ContributionMetadata,
) -> EngineResult<LedgerEntry> {
    ledger::settle_entry(conn, entry.id, status, &metadata.to_value())
        .await?
        .map(LedgerEntry::from)
        .ok_or(EngineError::ConcurrencyConflict)
}

/// Aggregates, the group funds mirror and round bookkeeping for a completed contribution.
async fn complete(
    conn: &mut PgConnection,
    group_id: Uuid,
    contributor: Uuid,
    amount: Decimal,
    entry_id: Uuid,
    open_round: Option<OpenRound>,
) -> EngineResult<Completion> {
    group_repo::record_member_contribution(conn, group_id, contributor, amount, Utc::now()).await?;
    let group_total_funds = group_repo::mirror_group_funds(conn, group_id).await?;

    let mut notes = Vec::new();
    let round = match open_round {
        Some(OpenRound {
            mut cycle,
            recipient_id,
        }) => {
            let round = cycle.current_round;
            cycle_repo::insert_round_contribution(conn, cycle.id, round, contributor, entry_id)
                .await
                .map_err(|err| match EngineError::from(err) {
                    EngineError::UniqueConstraintViolation(_) => {
                        EngineError::DuplicateRoundContribution { round }
                    }
                    other => other,
                })?;
            notes.push(notification::contribution_received(
                recipient_id,
                amount,
                &cycle,
            ));

            let contributions = cycle_repo::count_round_contributions(conn, cycle.id, round).await?;
            let (outcome, advance_notes) = apply_advance(conn, &mut cycle, contributions).await?;
            notes.extend(advance_notes);
            Some(outcome)
        }
        None => None,
    };

    Ok(Completion {
        group_total_funds,
        round,
        notes,
    })
}
