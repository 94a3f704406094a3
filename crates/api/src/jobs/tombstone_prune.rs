//! Drops notification tombstones whose source rows can no longer surface in the feed.

use tracing::info;

use super::scheduler::{Job, JobFrequency};
use crate::services::NotificationService;

pub struct TombstonePruneJob {
    notifications: NotificationService,
}

impl TombstonePruneJob {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

#[async_trait::async_trait]
impl Job for TombstonePruneJob {
    fn name(&self) -> &'static str {
        "tombstone_prune"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        let pruned = self
            .notifications
            .prune_tombstones()
            .await
            .map_err(|e| e.to_string())?;
        if pruned > 0 {
            info!(pruned, "Pruned notification tombstones");
        }
        Ok(())
    }
}
