//! `dnsflow`: an asynchronous DNS stub resolver.
//!
//! The crate is built from three layers: a binary RFC 1035 wire codec
//! ([`codec`]), a composable executor pipeline ([`executor`]) wrapping two
//! leaf transports ([`transport`]), and a high-level [`resolver::Resolver`]
//! that assembles the pipeline and adds CNAME chasing.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod hosts;
pub mod message;
pub mod resolver;
pub mod transport;
mod util;

pub use error::DnsError;
pub use message::{Query, RData, Record, RecordClass, RecordType};
pub use resolver::{Resolver, ResolverBuilder};
