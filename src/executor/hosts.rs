//! Answers A/AAAA/PTR queries from a local hosts file before ever reaching
//! the network, per spec §4.10. Anything the hosts file doesn't cover falls
//! through to the wrapped executor unchanged.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DnsError;
use crate::executor::{check_cancelled, BoxExecutor, Executor};
use crate::hosts::HostsFile;
use crate::message::{Message, RData, Record, RecordClass, RecordType, Query};

/// Synthetic answers never expire: the hosts file is re-read on process
/// start, so this TTL only matters to anything further up the stack that
/// caches by TTL.
const HOSTS_TTL: u32 = 0;

pub struct HostsExecutor {
    inner: BoxExecutor,
    hosts: Arc<HostsFile>,
}

impl HostsExecutor {
    pub fn new(inner: BoxExecutor, hosts: Arc<HostsFile>) -> Self {
        Self { inner, hosts }
    }
}

#[async_trait]
impl Executor for HostsExecutor {
    async fn execute(&self, query: Query, cancel: CancellationToken) -> Result<Message, DnsError> {
        check_cancelled(&cancel)?;

        if let Some(message) = self.synthesize(&query) {
            return Ok(message);
        }

        self.inner.execute(query, cancel).await
    }
}

impl HostsExecutor {
    fn synthesize(&self, query: &Query) -> Option<Message> {
        if query.qclass != RecordClass::Internet {
            return None;
        }

        let answers = match query.qtype {
            RecordType::A => self
                .hosts
                .lookup_a(&query.name)
                .into_iter()
                .map(|addr| Record::new(query.name.clone(), RecordClass::Internet, HOSTS_TTL, RData::A(addr)))
                .collect::<Vec<_>>(),
            RecordType::AAAA => self
                .hosts
                .lookup_aaaa(&query.name)
                .into_iter()
                .map(|addr| Record::new(query.name.clone(), RecordClass::Internet, HOSTS_TTL, RData::Aaaa(addr)))
                .collect(),
            RecordType::PTR => {
                let addr = parse_reverse_name(&query.name)?;
                self.hosts
                    .lookup_ptr(addr)
                    .into_iter()
                    .map(|name| Record::new(query.name.clone(), RecordClass::Internet, HOSTS_TTL, RData::Ptr(name)))
                    .collect()
            }
            _ => return None,
        };

        if answers.is_empty() {
            return None;
        }

        let mut message = Message::create_request(query.clone());
        message.is_response = true;
        message.is_authoritative = true;
        message.recursion_available = true;
        message.answers = answers;
        Some(message)
    }
}

/// Parses a reverse-lookup query name (`1.0.0.127.in-addr.arpa` or the
/// nibble-reversed `ip6.arpa` form) back into the address it names.
fn parse_reverse_name(name: &str) -> Option<IpAddr> {
    let lower = name.to_ascii_lowercase();

    if let Some(prefix) = lower.strip_suffix(".in-addr.arpa") {
        let parts: Vec<&str> = prefix.split('.').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut octets = [0u8; 4];
        for (i, part) in parts.iter().enumerate() {
            octets[3 - i] = part.parse().ok()?;
        }
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }

    if let Some(prefix) = lower.strip_suffix(".ip6.arpa") {
        let parts: Vec<&str> = prefix.split('.').collect();
        if parts.len() != 32 {
            return None;
        }
        let mut nibbles = [0u8; 32];
        for (i, part) in parts.iter().enumerate() {
            nibbles[31 - i] = u8::from_str_radix(part, 16).ok()?;
        }
        let mut octets = [0u8; 16];
        for i in 0..16 {
            octets[i] = (nibbles[2 * i] << 4) | nibbles[2 * i + 1];
        }
        return Some(IpAddr::V6(Ipv6Addr::from(octets)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableExecutor;
    #[async_trait]
    impl Executor for UnreachableExecutor {
        async fn execute(&self, _query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            panic!("hosts file should have answered without reaching the inner executor");
        }
    }

    struct PassthroughExecutor;
    #[async_trait]
    impl Executor for PassthroughExecutor {
        async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            Ok(Message::create_request(query))
        }
    }

    fn hosts() -> Arc<HostsFile> {
        Arc::new(HostsFile::parse("127.0.0.1 myhost\n::1 myhost\n"))
    }

    #[tokio::test]
    async fn a_record_is_synthesized_from_hosts_file() {
        let executor = HostsExecutor::new(Arc::new(UnreachableExecutor), hosts());
        let query = Query::new("myhost", RecordType::A);
        let message = executor.execute(query, CancellationToken::new()).await.unwrap();
        assert_eq!(message.answers[0].data, RData::A(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn ptr_record_is_synthesized_from_reverse_name() {
        let executor = HostsExecutor::new(Arc::new(UnreachableExecutor), hosts());
        let query = Query::new("1.0.0.127.in-addr.arpa", RecordType::PTR);
        let message = executor.execute(query, CancellationToken::new()).await.unwrap();
        assert_eq!(message.answers[0].data, RData::Ptr("myhost".into()));
    }

    #[tokio::test]
    async fn unmatched_query_falls_through_to_inner() {
        let executor = HostsExecutor::new(Arc::new(PassthroughExecutor), hosts());
        let query = Query::new("example.com", RecordType::A);
        assert!(executor.execute(query, CancellationToken::new()).await.is_ok());
    }
}
