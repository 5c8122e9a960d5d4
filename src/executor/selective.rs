//! Upgrades a truncated UDP response to TCP transparently, per spec §4.4.
//! Callers of a [`SelectiveExecutor`] never see [`DnsError::ResponseTruncated`]
//! escape — it's either resolved by the TCP retry or replaced by whatever
//! error that retry produced.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::DnsError;
use crate::executor::{check_cancelled, Executor};
use crate::message::{Message, Query};

pub struct SelectiveExecutor<U, T> {
    udp: U,
    tcp: T,
}

impl<U, T> SelectiveExecutor<U, T> {
    pub fn new(udp: U, tcp: T) -> Self {
        Self { udp, tcp }
    }
}

#[async_trait]
impl<U, T> Executor for SelectiveExecutor<U, T>
where
    U: Executor,
    T: Executor,
{
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        match self.udp.execute(query.clone(), cancel.clone()).await {
            Err(DnsError::ResponseTruncated) => {
                debug!(name = %query.name, "udp response truncated, retrying over tcp");
                self.tcp.execute(query, cancel).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RecordType;

    struct TruncatingExecutor;
    #[async_trait]
    impl Executor for TruncatingExecutor {
        async fn execute(&self, _query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            Err(DnsError::ResponseTruncated)
        }
    }

    struct OkExecutor;
    #[async_trait]
    impl Executor for OkExecutor {
        async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            Ok(Message::create_request(query))
        }
    }

    #[tokio::test]
    async fn truncated_udp_falls_back_to_tcp() {
        let executor = SelectiveExecutor::new(TruncatingExecutor, OkExecutor);
        let query = Query::new("example.com", RecordType::A);
        assert!(executor.execute(query, CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn untruncated_udp_response_is_returned_directly() {
        let executor = SelectiveExecutor::new(OkExecutor, TruncatingExecutor);
        let query = Query::new("example.com", RecordType::A);
        assert!(executor.execute(query, CancellationToken::new()).await.is_ok());
    }
}
