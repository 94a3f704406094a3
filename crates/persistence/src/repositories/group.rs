//! Group and membership repository.
//!
//! Reads go through the pool held by [`GroupRepository`]. Writes that must
//! share a unit of work are free functions taking `&mut PgConnection`.

use chrono::{DateTime, Utc};
use domain::models::group::{CreateGroupRequest, MemberRole};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::group::GROUP_COLUMNS;
use crate::entities::{GroupEntity, GroupSummaryEntity, MemberRoleDb, MembershipEntity};
use crate::metrics::QueryTimer;

const MEMBERSHIP_COLUMNS: &str =
    "id, group_id, user_id, role, is_active, joined_at, total_contributions, last_contribution_at";

/// Repository for group-related database operations.
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Creates a new GroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a group by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_by_id");
        let result = sqlx::query_as::<_, GroupEntity>(&format!(
            "SELECT {} FROM groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user's membership in a group, active or not.
    pub async fn find_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_membership");
        let result = sqlx::query_as::<_, MembershipEntity>(&format!(
            "SELECT {} FROM memberships WHERE group_id = $1 AND user_id = $2",
            MEMBERSHIP_COLUMNS
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Groups the user is an active member of, newest membership first.
    pub async fn find_user_groups(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GroupSummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_groups");
        let result = sqlx::query_as::<_, GroupSummaryEntity>(
            r#"
            SELECT g.id, g.name, g.category, g.member_count, g.total_funds, g.currency,
                   m.role, m.joined_at
            FROM groups g
            JOIN memberships m ON m.group_id = g.id
            WHERE m.user_id = $1 AND m.is_active = true AND g.is_active = true
            ORDER BY m.joined_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_user_groups(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_user_groups");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM memberships m
            JOIN groups g ON g.id = m.group_id
            WHERE m.user_id = $1 AND m.is_active = true AND g.is_active = true
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}

/// Insert a group row.
pub async fn insert_group(
    conn: &mut PgConnection,
    request: &CreateGroupRequest,
    currency: &str,
    max_members: i32,
    created_by: Uuid,
) -> Result<GroupEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_group");
    let result = sqlx::query_as::<_, GroupEntity>(&format!(
        r#"
        INSERT INTO groups (name, description, category, subtype, contribution_amount,
            contribution_frequency, target_amount, payment_recipient_name,
            payment_recipient_account, is_public, max_members, currency, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        GROUP_COLUMNS
    ))
    .bind(&request.name)
    .bind(&request.description)
    .bind(request.category)
    .bind(&request.subtype)
    .bind(request.contribution_amount)
    .bind(request.contribution_frequency)
    .bind(request.target_amount)
    .bind(&request.payment_recipient_name)
    .bind(&request.payment_recipient_account)
    .bind(request.is_public)
    .bind(max_members)
    .bind(currency)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Load a group and lock its row for the rest of the transaction.
pub async fn lock_group(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Option<GroupEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_group");
    let result = sqlx::query_as::<_, GroupEntity>(&format!(
        "SELECT {} FROM groups WHERE id = $1 FOR UPDATE",
        GROUP_COLUMNS
    ))
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

/// Load a group without locking it.
pub async fn find_group(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Option<GroupEntity>, sqlx::Error> {
    let timer = QueryTimer::new("find_group_in_tx");
    let result = sqlx::query_as::<_, GroupEntity>(&format!(
        "SELECT {} FROM groups WHERE id = $1",
        GROUP_COLUMNS
    ))
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn find_membership(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MembershipEntity>, sqlx::Error> {
    let timer = QueryTimer::new("find_membership_in_tx");
    let result = sqlx::query_as::<_, MembershipEntity>(&format!(
        "SELECT {} FROM memberships WHERE group_id = $1 AND user_id = $2",
        MEMBERSHIP_COLUMNS
    ))
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

/// Active memberships for a set of users in one group.
pub async fn find_active_memberships(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_ids: &[Uuid],
) -> Result<Vec<MembershipEntity>, sqlx::Error> {
    let timer = QueryTimer::new("find_active_memberships");
    let result = sqlx::query_as::<_, MembershipEntity>(&format!(
        "SELECT {} FROM memberships WHERE group_id = $1 AND user_id = ANY($2) AND is_active = true",
        MEMBERSHIP_COLUMNS
    ))
    .bind(group_id)
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await;
    timer.record();
    result
}

/// Insert a membership, or reactivate a previous one with the given role.
pub async fn upsert_membership(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<MembershipEntity, sqlx::Error> {
    let timer = QueryTimer::new("upsert_membership");
    let result = sqlx::query_as::<_, MembershipEntity>(&format!(
        r#"
        INSERT INTO memberships (group_id, user_id, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (group_id, user_id)
        DO UPDATE SET role = EXCLUDED.role, is_active = true, joined_at = NOW()
        RETURNING {}
        "#,
        MEMBERSHIP_COLUMNS
    ))
    .bind(group_id)
    .bind(user_id)
    .bind(MemberRoleDb::from(role))
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Recount active members onto the group row.
pub async fn refresh_member_count(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<i32, sqlx::Error> {
    let timer = QueryTimer::new("refresh_member_count");
    let result = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE groups
        SET member_count = (
                SELECT COUNT(*)::int FROM memberships WHERE group_id = $1 AND is_active = true
            ),
            updated_at = NOW()
        WHERE id = $1
        RETURNING member_count
        "#,
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn count_chairpersons(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let timer = QueryTimer::new("count_chairpersons");
    let result = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM memberships
        WHERE group_id = $1 AND role = 'chairperson' AND is_active = true
        "#,
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Lock a membership row for a role change.
pub async fn lock_membership(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MembershipEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_membership");
    let result = sqlx::query_as::<_, MembershipEntity>(&format!(
        "SELECT {} FROM memberships WHERE group_id = $1 AND user_id = $2 FOR UPDATE",
        MEMBERSHIP_COLUMNS
    ))
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn update_member_role(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<MembershipEntity, sqlx::Error> {
    let timer = QueryTimer::new("update_member_role");
    let result = sqlx::query_as::<_, MembershipEntity>(&format!(
        "UPDATE memberships SET role = $3 WHERE group_id = $1 AND user_id = $2 RETURNING {}",
        MEMBERSHIP_COLUMNS
    ))
    .bind(group_id)
    .bind(user_id)
    .bind(MemberRoleDb::from(role))
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Apply a completed contribution to the contributor's aggregates.
pub async fn record_member_contribution(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let timer = QueryTimer::new("record_member_contribution");
    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET total_contributions = total_contributions + $3,
            last_contribution_at = $4
        WHERE group_id = $1 AND user_id = $2
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .bind(amount)
    .bind(at)
    .execute(&mut *conn)
    .await;
    timer.record();
    result.map(|_| ())
}

/// Copy the group wallet balance onto `groups.total_funds`.
pub async fn mirror_group_funds(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Decimal, sqlx::Error> {
    let timer = QueryTimer::new("mirror_group_funds");
    let result = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE groups
        SET total_funds = COALESCE(
                (SELECT balance FROM wallets WHERE owner_id = $1 AND kind = 'group'),
                0
            ),
            updated_at = NOW()
        WHERE id = $1
        RETURNING total_funds
        "#,
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}
