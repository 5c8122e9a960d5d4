//! Retries the wrapped executor up to `R` additional times on failure, with
//! no backoff — per spec, retry doesn't distinguish transient from permanent
//! failure kinds, it simply re-attempts and surfaces the last error.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::message::{Message, Query};

/// Default number of retries beyond the initial attempt, per spec §4.5.
pub const DEFAULT_RETRIES: u32 = 2;

pub struct RetryExecutor {
    inner: BoxExecutor,
    retries: u32,
}

impl RetryExecutor {
    pub fn new(inner: BoxExecutor) -> Self {
        Self { inner, retries: DEFAULT_RETRIES }
    }

    pub fn with_retries(inner: BoxExecutor, retries: u32) -> Self {
        Self { inner, retries }
    }
}

#[async_trait]
impl Executor for RetryExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        let mut attempt = 0;
        loop {
            check_cancelled(&cancel)?;
            match self.inner.execute(query.clone(), cancel.clone()).await {
                Ok(message) => return Ok(message),
                Err(DnsError::Cancelled) => return Err(DnsError::Cancelled),
                Err(err) if attempt < self.retries => {
                    debug!(name = %query.name, attempt, error = %err, "retrying query");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordType;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyExecutor {
        fails_before_success: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Executor for FlakyExecutor {
        async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fails_before_success {
                Err(DnsError::QueryFailed("simulated failure".into()))
            } else {
                Ok(Message::create_request(query))
            }
        }
    }

    #[tokio::test]
    async fn succeeds_after_retrying() {
        let inner: BoxExecutor = Arc::new(FlakyExecutor {
            fails_before_success: 2,
            attempts: AtomicU32::new(0),
        });
        let executor = RetryExecutor::new(inner);
        let query = Query::new("example.com", RecordType::A);
        assert!(executor.execute(query, CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let inner: BoxExecutor = Arc::new(FlakyExecutor {
            fails_before_success: 10,
            attempts: AtomicU32::new(0),
        });
        let executor = RetryExecutor::with_retries(inner, 1);
        let query = Query::new("example.com", RecordType::A);
        assert!(executor.execute(query, CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        struct CancelledExecutor;
        #[async_trait]
        impl Executor for CancelledExecutor {
            async fn execute(&self, _query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
                Err(DnsError::Cancelled)
            }
        }
        let executor = RetryExecutor::new(Arc::new(CancelledExecutor));
        let query = Query::new("example.com", RecordType::A);
        let err = executor.execute(query, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::Cancelled));
    }
}
