//! Rotating payout cycles: creation, detail and round advancement.

use chrono::Utc;
use domain::models::group::Membership;
use domain::models::notification::NewNotification;
use domain::models::rotating_payout::{
    validate_participants, AdvanceOutcome, CreateCycleRequest, CycleDetail, CycleStatus,
    Participant, RotatingPayoutCycle,
};
use domain::services::{authorization, notification};
use domain::{EngineError, EngineResult};
use persistence::repositories::{group as group_repo, rotating_payout as cycle_repo};
use persistence::repositories::{CycleRepository, GroupRepository};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::engine::{lock_active_group, membership, EngineContext};
use crate::middleware::metrics::record_round_advanced;

#[derive(Clone)]
pub struct CycleService {
    ctx: EngineContext,
    cycles: CycleRepository,
    groups: GroupRepository,
}

impl CycleService {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            cycles: CycleRepository::new(ctx.pool.clone()),
            groups: GroupRepository::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// Creates an active cycle; participants are paid in the order given.
    pub async fn create(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: CreateCycleRequest,
    ) -> EngineResult<CycleDetail> {
        request.validate()?;
        validate_participants(&request.participants)?;

        let detail = self
            .ctx
            .run(|| self.create_once(group_id, user_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            cycle_id = %detail.cycle.id,
            user_id = %user_id,
            participants = detail.participants.len(),
            "Rotating payout cycle created"
        );
        Ok(detail)
    }

    async fn create_once(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: &CreateCycleRequest,
    ) -> EngineResult<CycleDetail> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        lock_active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_officer(caller.as_ref())?;

        if cycle_repo::has_active_cycle(conn, group_id).await? {
            return Err(EngineError::UniqueConstraintViolation(
                "group already has an active rotating payout cycle".into(),
            ));
        }

        let active: HashSet<Uuid> =
            group_repo::find_active_memberships(conn, group_id, &request.participants)
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect();
        if let Some(outsider) = request.participants.iter().find(|p| !active.contains(p)) {
            return Err(EngineError::Validation(format!(
                "Participant {} is not an active member of this group",
                outsider
            )));
        }

        let now = Utc::now();
        let start_date = request.start_date.unwrap_or(now);
        let next_payout_date = request
            .frequency
            .offset(start_date, 1)
            .ok_or_else(|| EngineError::Validation("Start date out of range".into()))?;
        let total_participants = i32::try_from(request.participants.len())
            .map_err(|_| EngineError::Validation("Too many participants".into()))?;

        let draft = RotatingPayoutCycle {
            id: Uuid::nil(),
            group_id,
            name: request.name.clone(),
            amount_per_round: request.amount_per_round,
            frequency: request.frequency,
            total_participants,
            current_round: 1,
            status: CycleStatus::Active,
            start_date,
            next_payout_date,
            created_by: user_id,
            created_at: now,
            updated_at: now,
        };
        let cycle = RotatingPayoutCycle::from(cycle_repo::insert_cycle(conn, &draft).await?);

        let mut participants = Vec::with_capacity(request.participants.len());
        for (position, participant) in (1..).zip(request.participants.iter()) {
            let row = cycle_repo::insert_participant(conn, cycle.id, *participant, position).await?;
            participants.push(Participant::from(row));
        }

        self.ctx.commit(uow).await?;
        Ok(CycleDetail::new(cycle, participants, Vec::new()))
    }

    /// Cycle with participants and the current round's progress. Members only.
    pub async fn get(&self, cycle_id: Uuid, user_id: Uuid) -> EngineResult<CycleDetail> {
        let cycle = self
            .cycles
            .find_by_id(cycle_id)
            .await?
            .map(RotatingPayoutCycle::from)
            .ok_or(EngineError::CycleNotFound)?;

        let caller = self
            .groups
            .find_membership(cycle.group_id, user_id)
            .await?
            .map(Membership::from);
        authorization::require_active_member(caller.as_ref())?;

        let participants = self
            .cycles
            .find_participants(cycle.id)
            .await?
            .into_iter()
            .map(Participant::from)
            .collect();
        let contributors = if cycle.status == CycleStatus::Active {
            self.cycles
                .round_contributors(cycle.id, cycle.current_round)
                .await?
        } else {
            Vec::new()
        };
        Ok(CycleDetail::new(cycle, participants, contributors))
    }

    /// Explicit advancement by an officer. A no-op while the round is still open.
    pub async fn advance(&self, cycle_id: Uuid, user_id: Uuid) -> EngineResult<AdvanceOutcome> {
        let outcome = self
            .ctx
            .run(|| self.advance_once(cycle_id, user_id))
            .await?;

        if !matches!(outcome, AdvanceOutcome::RoundInProgress { .. }) {
            record_round_advanced();
        }
        info!(cycle_id = %cycle_id, user_id = %user_id, outcome = ?outcome, "Cycle advance evaluated");
        Ok(outcome)
    }

    async fn advance_once(&self, cycle_id: Uuid, user_id: Uuid) -> EngineResult<AdvanceOutcome> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let mut cycle = cycle_repo::lock_cycle(conn, cycle_id)
            .await?
            .map(RotatingPayoutCycle::from)
            .ok_or(EngineError::CycleNotFound)?;
        let caller = membership(conn, cycle.group_id, user_id).await?;
        authorization::require_officer(caller.as_ref())?;

        let contributions =
            cycle_repo::count_round_contributions(conn, cycle.id, cycle.current_round).await?;
        let (outcome, notes) = apply_advance(conn, &mut cycle, contributions).await?;

        self.ctx.notify(&mut uow, notes);
        self.ctx.commit(uow).await?;
        Ok(outcome)
    }
}

/// Runs the advancement rule on a locked cycle and persists the result.
///
/// Returns the notifications to send once the caller commits.
pub(crate) async fn apply_advance(
    conn: &mut PgConnection,
    cycle: &mut RotatingPayoutCycle,
    contributions: i64,
) -> EngineResult<(AdvanceOutcome, Vec<NewNotification>)> {
    let finished_round = cycle.current_round;
    let outcome = cycle.advance(contributions)?;

    let mut notes = Vec::new();
    match outcome {
        AdvanceOutcome::RoundInProgress { .. } => return Ok((outcome, notes)),
        AdvanceOutcome::Advanced { round } => {
            cycle_repo::mark_received(conn, cycle.id, finished_round).await?;
            cycle_repo::save_progress(conn, cycle).await?;
            if let Some(next) = cycle_repo::participant_at(conn, cycle.id, round).await? {
                notes.push(notification::payout_round(cycle, next.user_id));
            }
        }
        AdvanceOutcome::CycleCompleted => {
            cycle_repo::mark_received(conn, cycle.id, finished_round).await?;
            cycle_repo::save_progress(conn, cycle).await?;
        }
    }

    info!(
        cycle_id = %cycle.id,
        group_id = %cycle.group_id,
        finished_round,
        outcome = ?outcome,
        "Rotating payout round closed"
    );
    Ok((outcome, notes))
}
