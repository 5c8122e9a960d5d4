//! Coalesces identical in-flight queries (same `cache_key`) onto a single
//! inner execution, per spec §4.7. Cancellation is ref-counted: the shared
//! execution is only cancelled once every caller waiting on it has cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::message::{Message, Query};

type SharedResult = Option<Result<Message, DnsError>>;

struct InFlight {
    cancel: CancellationToken,
    waiters: AtomicUsize,
    result_rx: watch::Receiver<SharedResult>,
}

pub struct CoopExecutor {
    inner: BoxExecutor,
    inflight: Arc<Mutex<HashMap<String, Arc<InFlight>>>>,
}

impl CoopExecutor {
    pub fn new(inner: BoxExecutor) -> Self {
        Self { inner, inflight: Arc::new(Mutex::new(HashMap::new())) }
    }
}

#[async_trait]
impl Executor for CoopExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        let key = query.cache_key();
        let shared = {
            let mut map = self.inflight.lock().unwrap();
            if let Some(shared) = map.get(&key) {
                shared.waiters.fetch_add(1, Ordering::SeqCst);
                trace!(name = %query.name, "joining in-flight query");
                shared.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                let shared = Arc::new(InFlight {
                    cancel: CancellationToken::new(),
                    waiters: AtomicUsize::new(1),
                    result_rx: rx,
                });
                map.insert(key.clone(), shared.clone());
                spawn_leader(self.inner.clone(), self.inflight.clone(), key, query.clone(), shared.cancel.clone(), tx);
                shared
            }
        };

        let mut result_rx = shared.result_rx.clone();
        tokio::select! {
            _ = cancel.cancelled() => {
                let remaining = shared.waiters.fetch_sub(1, Ordering::SeqCst) - 1;
                if remaining == 0 {
                    shared.cancel.cancel();
                }
                Err(DnsError::Cancelled)
            }
            result = wait_for_result(&mut result_rx) => {
                shared.waiters.fetch_sub(1, Ordering::SeqCst);
                result
            }
        }
    }
}

fn spawn_leader(
    inner: BoxExecutor,
    inflight: Arc<Mutex<HashMap<String, Arc<InFlight>>>>,
    key: String,
    query: Query,
    shared_cancel: CancellationToken,
    tx: watch::Sender<SharedResult>,
) {
    tokio::spawn(async move {
        let result = inner.execute(query, shared_cancel).await;
        let _ = tx.send(Some(result));
        inflight.lock().unwrap().remove(&key);
    });
}

async fn wait_for_result(rx: &mut watch::Receiver<SharedResult>) -> Result<Message, DnsError> {
    loop {
        if let Some(result) = rx.borrow().clone() {
            return result;
        }
        if rx.changed().await.is_err() {
            return Err(DnsError::QueryFailed("coalesced query's leader task vanished".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordType;
    use std::sync::atomic::{AtomicUsize as StdAtomicUsize, Ordering as StdOrdering};
    use std::time::Duration;

    struct CountingSlowExecutor {
        calls: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl Executor for CountingSlowExecutor {
        async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
            self.calls.fetch_add(1, StdOrdering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => Err(DnsError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(20)) => Ok(Message::create_request(query)),
            }
        }
    }

    #[tokio::test]
    async fn concurrent_identical_queries_share_one_execution() {
        let calls = Arc::new(StdAtomicUsize::new(0));
        let inner: BoxExecutor = Arc::new(CountingSlowExecutor { calls: calls.clone() });
        let executor = Arc::new(CoopExecutor::new(inner));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                let query = Query::new("example.com", RecordType::A);
                executor.execute(query, CancellationToken::new()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(StdOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_cancellation_does_not_cancel_remaining_waiters() {
        let calls = Arc::new(StdAtomicUsize::new(0));
        let inner: BoxExecutor = Arc::new(CountingSlowExecutor { calls: calls.clone() });
        let executor = Arc::new(CoopExecutor::new(inner));

        let patient_cancel = CancellationToken::new();
        let impatient_cancel = CancellationToken::new();

        let e1 = executor.clone();
        let patient = tokio::spawn(async move {
            e1.execute(Query::new("example.com", RecordType::A), patient_cancel).await
        });

        let e2 = executor.clone();
        let impatient_cancel_clone = impatient_cancel.clone();
        let impatient = tokio::spawn(async move {
            e2.execute(Query::new("example.com", RecordType::A), impatient_cancel_clone).await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        impatient_cancel.cancel();

        assert!(matches!(impatient.await.unwrap(), Err(DnsError::Cancelled)));
        assert!(patient.await.unwrap().is_ok());
    }
}
