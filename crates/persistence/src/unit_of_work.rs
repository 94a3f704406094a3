//! Transaction boundary for engine commands.
//!
//! A [`UnitOfWork`] wraps one serializable transaction. Side effects that
//! talk to other systems are queued with [`UnitOfWork::after_commit`] and
//! only start once the transaction has committed. Each hook runs on its own
//! task under a timeout; failures are logged and never reach the caller.

use domain::{EngineError, EngineResult};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

type HookFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'static>>;

struct PostCommitHook {
    name: &'static str,
    future: HookFuture,
}

pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
    hooks: Vec<PostCommitHook>,
}

impl UnitOfWork {
    /// Open a transaction at SERIALIZABLE isolation.
    pub async fn begin(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Self {
            tx,
            hooks: Vec::new(),
        })
    }

    /// The transaction's connection, for repository calls.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// Queue work to run after a successful commit.
    pub fn after_commit<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.hooks.push(PostCommitHook {
            name,
            future: Box::pin(future),
        });
    }

    pub fn pending_hooks(&self) -> usize {
        self.hooks.len()
    }

    /// Commit, then launch the queued hooks. Dropping a unit of work without
    /// committing rolls the transaction back and discards its hooks.
    pub async fn commit(self, hook_timeout: Duration) -> EngineResult<()> {
        self.tx.commit().await.map_err(EngineError::from)?;
        for hook in self.hooks {
            spawn_hook(hook, hook_timeout);
        }
        Ok(())
    }
}

fn spawn_hook(hook: PostCommitHook, hook_timeout: Duration) {
    let PostCommitHook { name, future } = hook;
    tokio::spawn(async move {
        match tokio::time::timeout(hook_timeout, future).await {
            Ok(Ok(())) => debug!(hook = name, "Post-commit hook finished"),
            Ok(Err(error)) => warn!(hook = name, error = %error, "Post-commit hook failed"),
            Err(_) => warn!(
                hook = name,
                timeout_ms = hook_timeout.as_millis() as u64,
                "Post-commit hook timed out"
            ),
        }
    });
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is used up. Each attempt must open its own unit of work.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, mut operation: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(err) if err.is_retryable() && attempt < attempts => {
                debug!(attempt, "Retrying after concurrency conflict");
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10u64 << attempt.min(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_with_retry_retries_conflicts_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_retry(3, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(EngineError::ConcurrencyConflict)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: EngineResult<()> = with_retry(2, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::ConcurrencyConflict)
            }
        })
        .await;
        assert!(matches!(result, Err(EngineError::ConcurrencyConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_other_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: EngineResult<()> = with_retry(5, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EngineError::NotAMember)
            }
        })
        .await;
        assert!(matches!(result, Err(EngineError::NotAMember)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert!(backoff(2) > backoff(1));
        assert_eq!(backoff(6), backoff(10));
    }
}
