//! Rotating payout cycle entities.

use chrono::{DateTime, Utc};
use domain::models::rotating_payout::{
    CycleStatus, Participant, PayoutFrequency, RotatingPayoutCycle,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct CycleEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub amount_per_round: Decimal,
    pub frequency: PayoutFrequency,
    pub total_participants: i32,
    pub current_round: i32,
    pub status: CycleStatus,
    pub start_date: DateTime<Utc>,
    pub next_payout_date: DateTime<Utc>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const CYCLE_COLUMNS: &str = "id, group_id, name, amount_per_round, frequency, \
    total_participants, current_round, status, start_date, next_payout_date, created_by, \
    created_at, updated_at";

impl From<CycleEntity> for RotatingPayoutCycle {
    fn from(entity: CycleEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            name: entity.name,
            amount_per_round: entity.amount_per_round,
            frequency: entity.frequency,
            total_participants: entity.total_participants,
            current_round: entity.current_round,
            status: entity.status,
            start_date: entity.start_date,
            next_payout_date: entity.next_payout_date,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantEntity {
    pub cycle_id: Uuid,
    pub user_id: Uuid,
    pub position: i32,
    pub has_received: bool,
}

impl From<ParticipantEntity> for Participant {
    fn from(entity: ParticipantEntity) -> Self {
        Self {
            cycle_id: entity.cycle_id,
            user_id: entity.user_id,
            position: entity.position,
            has_received: entity.has_received,
        }
    }
}
