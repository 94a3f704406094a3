//! Query latency and pool gauges for the engine database.
//!
//! Every repository function wraps its statement in a `QueryTimer` named after
//! the operation, so ledger locks and feed sources show up as separate series.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "chama_db_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Sampled by the pool metrics job.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let in_use = size.saturating_sub(idle);

    gauge!("chama_db_connections_in_use").set(in_use as f64);
    gauge!("chama_db_connections_idle").set(idle as f64);
    gauge!("chama_db_connections_total").set(size as f64);
}

/// Times one repository statement.
///
/// ```ignore
/// let timer = QueryTimer::new("lock_wallets");
/// let rows = sqlx::query_as::<_, WalletEntity>(LOCK_SQL).fetch_all(conn).await;
/// timer.record();
/// rows
/// ```
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    /// Consumes the timer so a statement is recorded once.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_query_duration(&self.query_name, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_creation() {
        let timer = QueryTimer::new("test_query");
        assert_eq!(timer.query_name, "test_query");
    }

    #[test]
    fn test_query_timer_with_string() {
        let name = String::from("lock_wallets");
        let timer = QueryTimer::new(name);
        assert_eq!(timer.query_name, "lock_wallets");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("ensure_wallet").record();
        record_query_duration("ensure_wallet", 0.002);
    }
}
