//! The public surface: [`Resolver`], built by [`ResolverBuilder`], which
//! assembles the full decorator chain described in spec §4 and adds CNAME
//! chasing on top.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{Cache, MemoryCache};
use crate::config::{Nameserver, Transport};
use crate::error::DnsError;
use crate::executor::cache::CachingExecutor;
use crate::executor::coop::CoopExecutor;
use crate::executor::fallback::FallbackExecutor;
use crate::executor::hosts::HostsExecutor;
use crate::executor::retry::{RetryExecutor, DEFAULT_RETRIES};
use crate::executor::selective::SelectiveExecutor;
use crate::executor::timeout::{TimeoutExecutor, DEFAULT_TIMEOUT};
use crate::executor::{BoxExecutor, Executor};
use crate::hosts::HostsFile;
use crate::message::{RData, RecordType};
use crate::transport::{TcpTransport, UdpTransport};

/// CNAME chains longer than this are treated as a lookup failure rather
/// than followed forever.
pub const MAX_CNAME_DEPTH: usize = 10;

pub struct ResolverBuilder {
    nameservers: Vec<Nameserver>,
    cache: Arc<dyn Cache>,
    hosts: Option<Arc<HostsFile>>,
    retries: u32,
    timeout: Duration,
}

impl ResolverBuilder {
    pub fn new(nameservers: Vec<Nameserver>) -> Self {
        Self {
            nameservers,
            cache: Arc::new(MemoryCache::new()),
            hosts: None,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn hosts_file(mut self, hosts: HostsFile) -> Self {
        self.hosts = Some(Arc::new(hosts));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Resolver, DnsError> {
        if self.nameservers.is_empty() {
            return Err(DnsError::InvalidConfiguration("no nameservers configured".into()));
        }

        let per_server: Vec<BoxExecutor> = self
            .nameservers
            .iter()
            .map(|ns| wrap_timeout(transport_for(ns), self.timeout))
            .collect();

        let combined = fold_fallback(per_server);
        let retried: BoxExecutor = Arc::new(RetryExecutor::with_retries(combined, self.retries));
        let coalesced: BoxExecutor = Arc::new(CoopExecutor::new(retried));
        let cached: BoxExecutor = Arc::new(CachingExecutor::new(coalesced, self.cache));

        let top: BoxExecutor = match self.hosts {
            Some(hosts) => Arc::new(HostsExecutor::new(cached, hosts)),
            None => cached,
        };

        Ok(Resolver { executor: top })
    }
}

fn transport_for(ns: &Nameserver) -> BoxExecutor {
    match ns.transport {
        Transport::Udp => Arc::new(SelectiveExecutor::new(UdpTransport::new(ns.addr), TcpTransport::new(ns.addr))),
        Transport::Tcp => Arc::new(TcpTransport::new(ns.addr)),
    }
}

fn wrap_timeout(executor: BoxExecutor, duration: Duration) -> BoxExecutor {
    Arc::new(TimeoutExecutor::with_duration(executor, duration))
}

/// Right-folds per-nameserver executors into a chain of [`FallbackExecutor`]s:
/// the first nameserver is tried, then the second, and so on.
fn fold_fallback(mut executors: Vec<BoxExecutor>) -> BoxExecutor {
    let mut iter = executors.drain(..).rev();
    let mut combined = iter.next().expect("at least one nameserver");
    for earlier in iter {
        combined = Arc::new(FallbackExecutor::new(earlier, combined));
    }
    combined
}

/// Resolves names over the assembled executor chain, chasing CNAMEs.
pub struct Resolver {
    executor: BoxExecutor,
}

impl Resolver {
    pub fn builder(nameservers: Vec<Nameserver>) -> ResolverBuilder {
        ResolverBuilder::new(nameservers)
    }

    /// Resolves `name` for `qtype`, following CNAMEs up to
    /// [`MAX_CNAME_DEPTH`] hops, stopping early if a chain revisits a name
    /// it has already seen.
    pub async fn resolve_all(&self, name: &str, qtype: RecordType) -> Result<Vec<RData>, DnsError> {
        let mut current = crate::message::strip_trailing_dot(name);
        let mut seen = HashSet::new();

        for _ in 0..MAX_CNAME_DEPTH {
            if !seen.insert(current.to_ascii_lowercase()) {
                return Err(DnsError::record_not_found(name, "CNAME chain revisited a previously-seen name"));
            }

            let query = crate::message::Query::new(current.clone(), qtype);
            let message = self.executor.execute(query, CancellationToken::new()).await?;

            if message.response_code != crate::message::ResponseCode::Ok {
                return Err(DnsError::from_response_code(name, message.response_code.name()));
            }

            let direct: Vec<RData> = message
                .answers
                .iter()
                .filter(|r| r.name.eq_ignore_ascii_case(&current) && r.rtype == qtype)
                .map(|r| r.data.clone())
                .collect();
            if !direct.is_empty() {
                return Ok(direct);
            }

            let cname = message
                .answers
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(&current) && r.rtype == RecordType::CNAME);

            match cname {
                Some(record) => {
                    let RData::Cname(target) = &record.data else { unreachable!("filtered on CNAME rtype") };
                    debug!(from = %current, to = %target, "following cname");
                    current = target.clone();
                }
                None => {
                    return Err(DnsError::record_not_found(name, "no matching records in response"));
                }
            }
        }

        Err(DnsError::record_not_found(name, "cname chain exceeded maximum depth"))
    }

    /// Resolves an A record and picks one answer at random, per spec — a
    /// stub resolver's callers generally want "an address", not "the list".
    pub async fn resolve(&self, name: &str) -> Result<std::net::Ipv4Addr, DnsError> {
        let answers = self.resolve_all(name, RecordType::A).await?;
        let addrs: Vec<std::net::Ipv4Addr> = answers
            .into_iter()
            .filter_map(|r| match r {
                RData::A(addr) => Some(addr),
                _ => None,
            })
            .collect();

        addrs
            .choose(&mut rand::rng())
            .copied()
            .ok_or_else(|| DnsError::record_not_found(name, "no A records in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Query, RecordClass, Record};
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    struct StaticExecutor {
        build: fn(Query) -> Message,
    }

    #[async_trait]
    impl Executor for StaticExecutor {
        async fn execute(&self, query: Query, _cancel: CancellationToken) -> Result<Message, DnsError> {
            Ok((self.build)(query))
        }
    }

    fn resolver_with(build: fn(Query) -> Message) -> Resolver {
        Resolver { executor: Arc::new(StaticExecutor { build }) }
    }

    #[tokio::test]
    async fn resolves_direct_a_record() {
        let resolver = resolver_with(|query| {
            let mut message = Message::create_request(query.clone());
            message.answers.push(Record::new(
                query.name,
                RecordClass::Internet,
                300,
                RData::A(Ipv4Addr::new(1, 2, 3, 4)),
            ));
            message
        });
        let addr = resolver.resolve("example.com").await.unwrap();
        assert_eq!(addr, Ipv4Addr::new(1, 2, 3, 4));
    }

    #[tokio::test]
    async fn follows_a_single_cname_hop() {
        let resolver = resolver_with(|query| {
            let mut message = Message::create_request(query.clone());
            if query.name == "alias.example.com" {
                message.answers.push(Record::new(
                    "alias.example.com",
                    RecordClass::Internet,
                    300,
                    RData::Cname("target.example.com".into()),
                ));
            } else {
                message.answers.push(Record::new(
                    query.name,
                    RecordClass::Internet,
                    300,
                    RData::A(Ipv4Addr::new(5, 6, 7, 8)),
                ));
            }
            message
        });
        let addr = resolver.resolve("alias.example.com").await.unwrap();
        assert_eq!(addr, Ipv4Addr::new(5, 6, 7, 8));
    }

    #[tokio::test]
    async fn self_referential_cname_is_rejected() {
        let resolver = resolver_with(|query| {
            let mut message = Message::create_request(query.clone());
            message.answers.push(Record::new(
                query.name.clone(),
                RecordClass::Internet,
                300,
                RData::Cname(query.name),
            ));
            message
        });
        assert!(resolver.resolve("loopy.example.com").await.is_err());
    }

    #[tokio::test]
    async fn non_ok_response_code_is_an_error() {
        let resolver = resolver_with(|query| {
            let mut message = Message::create_request(query);
            message.response_code = crate::message::ResponseCode::NameError;
            message
        });
        let err = resolver.resolve("missing.example.com").await.unwrap_err();
        assert!(matches!(err, DnsError::RecordNotFound { .. }));
    }
}
