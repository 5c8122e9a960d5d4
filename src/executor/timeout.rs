//! Bounds the wrapped executor to a wall-clock deadline, per spec §4.6.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::message::{Message, Query};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TimeoutExecutor {
    inner: BoxExecutor,
    duration: Duration,
}

impl TimeoutExecutor {
    pub fn new(inner: BoxExecutor) -> Self {
        Self { inner, duration: DEFAULT_TIMEOUT }
    }

    pub fn with_duration(inner: BoxExecutor, duration: Duration) -> Self {
        Self { inner, duration }
    }
}

#[async_trait]
impl Executor for TimeoutExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        let name = query.name.clone();
        // `cancel` is shared with every layer above us (clone(), not a child
        // token) — cancelling it directly would poison retry/fallback/coop's
        // view of the same request. Only the child token we hand to `inner`
        // may be cancelled here.
        let inner_cancel = cancel.child_token();
        match tokio::time::timeout(self.duration, self.inner.execute(query, inner_cancel.clone())).await {
            Ok(result) => result,
            Err(_) => {
                inner_cancel.cancel();
                Err(DnsError::Timeout { name, deadline: self.duration })
            }
        }
    }
}
