//! Handles shared by every engine command.

use domain::models::group::{Group, Membership};
use domain::models::notification::NewNotification;
use domain::{EngineError, EngineResult};
use persistence::repositories::{group as group_repo, NotificationRepository};
use persistence::{with_retry, UnitOfWork};
use sqlx::{PgConnection, PgPool};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;

/// Store, configuration and the notification sink, cloned into each service.
#[derive(Clone)]
pub struct EngineContext {
    pub pool: PgPool,
    pub config: Arc<Config>,
    notifications: NotificationRepository,
}

impl EngineContext {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self {
            notifications: NotificationRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    /// Runs one command attempt per call, retrying on concurrency conflicts.
    pub async fn run<T, F, Fut>(&self, operation: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        with_retry(self.config.engine.max_retries, operation).await
    }

    pub async fn begin(&self) -> EngineResult<UnitOfWork> {
        Ok(UnitOfWork::begin(&self.pool).await?)
    }

    pub async fn commit(&self, uow: UnitOfWork) -> EngineResult<()> {
        uow.commit(self.config.engine.hook_timeout()).await
    }

    /// Queue stored notifications to be written once `uow` commits.
    pub fn notify(&self, uow: &mut UnitOfWork, items: Vec<NewNotification>) {
        if items.is_empty() {
            return;
        }
        let repo = self.notifications.clone();
        uow.after_commit("store_notifications", async move {
            for item in &items {
                repo.insert(item).await.map_err(|e| e.to_string())?;
            }
            Ok(())
        });
    }
}

/// Loads an active group inside the transaction.
pub(crate) async fn active_group(conn: &mut PgConnection, group_id: Uuid) -> EngineResult<Group> {
    let group = group_repo::find_group(conn, group_id)
        .await?
        .map(Group::from)
        .ok_or(EngineError::GroupNotFound)?;
    if !group.is_active {
        return Err(EngineError::GroupInactive);
    }
    Ok(group)
}

/// Same as [`active_group`] but holds the row lock until commit.
pub(crate) async fn lock_active_group(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> EngineResult<Group> {
    let group = group_repo::lock_group(conn, group_id)
        .await?
        .map(Group::from)
        .ok_or(EngineError::GroupNotFound)?;
    if !group.is_active {
        return Err(EngineError::GroupInactive);
    }
    Ok(group)
}

pub(crate) async fn membership(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
) -> EngineResult<Option<Membership>> {
    Ok(group_repo::find_membership(conn, group_id, user_id)
        .await?
        .map(Membership::from))
}
