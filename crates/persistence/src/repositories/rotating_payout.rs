//! Rotating payout cycle repository.

use domain::models::rotating_payout::RotatingPayoutCycle;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::rotating_payout::CYCLE_COLUMNS;
use crate::entities::{CycleEntity, ParticipantEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct CycleRepository {
    pool: PgPool,
}

impl CycleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CycleEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_cycle_by_id");
        let result = sqlx::query_as::<_, CycleEntity>(&format!(
            "SELECT {} FROM rotating_payout_cycles WHERE id = $1",
            CYCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_participants(
        &self,
        cycle_id: Uuid,
    ) -> Result<Vec<ParticipantEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_cycle_participants");
        let result = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            SELECT cycle_id, user_id, position, has_received
            FROM rotating_payout_participants
            WHERE cycle_id = $1
            ORDER BY position
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Members with a completed contribution for the given round, in arrival order.
    pub async fn round_contributors(
        &self,
        cycle_id: Uuid,
        round: i32,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("round_contributors");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT contributor_id FROM rotating_payout_contributions
            WHERE cycle_id = $1 AND round = $2
            ORDER BY created_at, contributor_id
            "#,
        )
        .bind(cycle_id)
        .bind(round)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

pub async fn insert_cycle(
    conn: &mut PgConnection,
    cycle: &RotatingPayoutCycle,
) -> Result<CycleEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_cycle");
    let result = sqlx::query_as::<_, CycleEntity>(&format!(
        r#"
        INSERT INTO rotating_payout_cycles (group_id, name, amount_per_round, frequency,
            total_participants, current_round, status, start_date, next_payout_date, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        CYCLE_COLUMNS
    ))
    .bind(cycle.group_id)
    .bind(&cycle.name)
    .bind(cycle.amount_per_round)
    .bind(cycle.frequency)
    .bind(cycle.total_participants)
    .bind(cycle.current_round)
    .bind(cycle.status)
    .bind(cycle.start_date)
    .bind(cycle.next_payout_date)
    .bind(cycle.created_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn insert_participant(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    user_id: Uuid,
    position: i32,
) -> Result<ParticipantEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_participant");
    let result = sqlx::query_as::<_, ParticipantEntity>(
        r#"
        INSERT INTO rotating_payout_participants (cycle_id, user_id, position)
        VALUES ($1, $2, $3)
        RETURNING cycle_id, user_id, position, has_received
        "#,
    )
    .bind(cycle_id)
    .bind(user_id)
    .bind(position)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// The active cycle of a group, locked.
pub async fn lock_active_cycle(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Option<CycleEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_active_cycle");
    let result = sqlx::query_as::<_, CycleEntity>(&format!(
        r#"
        SELECT {} FROM rotating_payout_cycles
        WHERE group_id = $1 AND status = 'active'
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
        CYCLE_COLUMNS
    ))
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn lock_cycle(conn: &mut PgConnection, id: Uuid) -> Result<Option<CycleEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_cycle");
    let result = sqlx::query_as::<_, CycleEntity>(&format!(
        "SELECT {} FROM rotating_payout_cycles WHERE id = $1 FOR UPDATE",
        CYCLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn has_active_cycle(conn: &mut PgConnection, group_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM rotating_payout_cycles WHERE group_id = $1 AND status = 'active')",
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await
}

/// Participant holding the given position.
pub async fn participant_at(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    position: i32,
) -> Result<Option<ParticipantEntity>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantEntity>(
        r#"
        SELECT cycle_id, user_id, position, has_received
        FROM rotating_payout_participants
        WHERE cycle_id = $1 AND position = $2
        "#,
    )
    .bind(cycle_id)
    .bind(position)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn is_participant(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM rotating_payout_participants WHERE cycle_id = $1 AND user_id = $2
        )
        "#,
    )
    .bind(cycle_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn has_contributed(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    round: i32,
    contributor_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let timer = QueryTimer::new("has_contributed_in_round");
    let result = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM rotating_payout_contributions
            WHERE cycle_id = $1 AND round = $2 AND contributor_id = $3
        )
        "#,
    )
    .bind(cycle_id)
    .bind(round)
    .bind(contributor_id)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Record a completed round contribution. The primary key rejects a second one.
pub async fn insert_round_contribution(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    round: i32,
    contributor_id: Uuid,
    transaction_id: Uuid,
) -> Result<(), sqlx::Error> {
    let timer = QueryTimer::new("insert_round_contribution");
    let result = sqlx::query(
        r#"
        INSERT INTO rotating_payout_contributions (cycle_id, round, contributor_id, transaction_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(cycle_id)
    .bind(round)
    .bind(contributor_id)
    .bind(transaction_id)
    .execute(&mut *conn)
    .await;
    timer.record();
    result.map(|_| ())
}

pub async fn count_round_contributions(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    round: i32,
) -> Result<i64, sqlx::Error> {
    let timer = QueryTimer::new("count_round_contributions");
    let result = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM rotating_payout_contributions WHERE cycle_id = $1 AND round = $2",
    )
    .bind(cycle_id)
    .bind(round)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Persist the round pointer after advancement.
pub async fn save_progress(
    conn: &mut PgConnection,
    cycle: &RotatingPayoutCycle,
) -> Result<CycleEntity, sqlx::Error> {
    let timer = QueryTimer::new("save_cycle_progress");
    let result = sqlx::query_as::<_, CycleEntity>(&format!(
        r#"
        UPDATE rotating_payout_cycles
        SET current_round = $2, status = $3, next_payout_date = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        CYCLE_COLUMNS
    ))
    .bind(cycle.id)
    .bind(cycle.current_round)
    .bind(cycle.status)
    .bind(cycle.next_payout_date)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Flag the recipient of a finished round.
pub async fn mark_received(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    position: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE rotating_payout_participants
        SET has_received = true
        WHERE cycle_id = $1 AND position = $2
        "#,
    )
    .bind(cycle_id)
    .bind(position)
    .execute(&mut *conn)
    .await
    .map(|_| ())
}

