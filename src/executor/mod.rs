//! The composable executor pipeline: a single contract every layer of the
//! decorator stack implements, from the leaf transports up through caching,
//! coalescing, retry, timeout, and fallback.

pub mod cache;
pub mod coop;
pub mod fallback;
pub mod hosts;
pub mod retry;
pub mod selective;
pub mod timeout;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DnsError;
use crate::message::{Message, Query};

/// Accepts a query, produces an eventual message-or-error, and supports
/// cooperative cancellation via `cancel`. Implementations must observe
/// `cancel` at every suspension point and return [`DnsError::Cancelled`]
/// promptly once it fires; a cancel after settlement is a no-op by
/// construction (the caller simply stops polling/awaiting).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError>;
}

/// A boxed, type-erased executor — the shape the decorator stack is built
/// from at resolver-construction time.
pub type BoxExecutor = std::sync::Arc<dyn Executor>;

#[async_trait]
impl Executor for BoxExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        self.as_ref().execute(query, cancel).await
    }
}

/// Returns `Err(DnsError::Cancelled)` if `cancel` has already fired. Called
/// at each suspension point by every decorator so cancellation is observed
/// promptly rather than only at the next inner completion.
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), DnsError> {
    if cancel.is_cancelled() {
        Err(DnsError::Cancelled)
    } else {
        Ok(())
    }
}
