//! Caches successful, non-truncated responses keyed by
//! [`crate::message::Query::cache_key`], TTL'd to the minimum TTL across the
//! answer and authority sections.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::cache::Cache;
use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::message::{Message, Query};

/// Used when a cacheable response carries no records at all to derive a TTL
/// from (e.g. an empty NOERROR answer).
const DEFAULT_TTL: Duration = Duration::from_secs(60);

pub struct CachingExecutor {
    inner: BoxExecutor,
    cache: Arc<dyn Cache>,
}

impl CachingExecutor {
    pub fn new(inner: BoxExecutor, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Executor for CachingExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        let key = query.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            trace!(name = %query.name, "cache hit");
            return Ok(cached);
        }

        let message = self.inner.execute(query, cancel).await?;

        if !message.is_truncated {
            let ttl = min_ttl(&message).unwrap_or(DEFAULT_TTL);
            self.cache.set(&key, message.clone(), ttl);
        }

        Ok(message)
    }
}

fn min_ttl(message: &Message) -> Option<Duration> {
    message
        .answers
        .iter()
        .chain(message.authority.iter())
        .map(|record| record.ttl)
        .min()
        .map(|seconds| Duration::from_secs(seconds as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::message::{RData, Record, RecordClass, RecordType};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExecutor {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut message = Message::create_request(query.clone());
            message.answers.push(Record::new(
                query.name,
                RecordClass::Internet,
                30,
                RData::A(Ipv4Addr::new(1, 2, 3, 4)),
            ));
            Ok(message)
        }
    }

    #[tokio::test]
    async fn second_query_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner: BoxExecutor = Arc::new(CountingExecutor { calls: calls.clone() });
        let executor = CachingExecutor::new(inner, Arc::new(MemoryCache::new()));

        let query = Query::new("example.com", RecordType::A);
        executor.execute(query.clone(), CancellationToken::new()).await.unwrap();
        executor.execute(query, CancellationToken::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn truncated_responses_are_not_cached() {
        struct TruncatingExecutor;
        #[async_trait]
        impl Executor for TruncatingExecutor {
            async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
                let mut message = Message::create_request(query);
                message.is_truncated = true;
                Ok(message)
            }
        }

        let cache = Arc::new(MemoryCache::new());
        let executor = CachingExecutor::new(Arc::new(TruncatingExecutor), cache.clone());
        let query = Query::new("example.com", RecordType::A);
        executor.execute(query.clone(), CancellationToken::new()).await.unwrap();

        assert!(cache.get(&query.cache_key()).is_none());
    }
}
