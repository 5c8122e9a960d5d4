//! Nameserver configuration: where to send queries and over which
//! transport.

use std::net::{IpAddr, SocketAddr};

use serde::Deserialize;

use crate::error::DnsError;

/// A transport-tagged nameserver address, as you'd write it in a resolver
/// config file: `1.1.1.1`, `udp://1.1.1.1:53`, `tcp://[2001:db8::1]:53`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nameserver {
    pub addr: SocketAddr,
    pub transport: Transport,
}

const DEFAULT_DNS_PORT: u16 = 53;

/// Parses a nameserver address string. Accepts a bare IPv4/IPv6 address
/// (port defaults to 53, transport defaults to UDP), a bracketed
/// `[addr]:port` form, or a `udp://`/`tcp://` URI with an explicit scheme.
pub fn parse_nameserver(input: &str) -> Result<Nameserver, DnsError> {
    if input.contains("://") {
        return parse_uri_nameserver(input);
    }

    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(Nameserver { addr, transport: Transport::Udp });
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(Nameserver { addr: SocketAddr::new(ip, DEFAULT_DNS_PORT), transport: Transport::Udp });
    }

    // Bracketed IPv6 with no port, e.g. "[::1]" — SocketAddr::from_str
    // rejects this since there's no ":port" to split on.
    if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Ok(ip) = inner.parse::<IpAddr>() {
            return Ok(Nameserver { addr: SocketAddr::new(ip, DEFAULT_DNS_PORT), transport: Transport::Udp });
        }
    }

    Err(DnsError::InvalidConfiguration(format!(
        "'{input}' is not a valid nameserver address"
    )))
}

fn parse_uri_nameserver(input: &str) -> Result<Nameserver, DnsError> {
    let url = url::Url::parse(input)
        .map_err(|e| DnsError::InvalidConfiguration(format!("'{input}' is not a valid nameserver URI: {e}")))?;

    let transport = match url.scheme() {
        "udp" => Transport::Udp,
        "tcp" => Transport::Tcp,
        other => {
            return Err(DnsError::InvalidConfiguration(format!(
                "unsupported nameserver scheme '{other}', expected udp or tcp"
            )))
        }
    };

    let host = url
        .host_str()
        .ok_or_else(|| DnsError::InvalidConfiguration(format!("'{input}' is missing a host")))?;
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| DnsError::InvalidConfiguration(format!("'{host}' is not a valid IP address")))?;
    let port = url.port().unwrap_or(DEFAULT_DNS_PORT);

    Ok(Nameserver { addr: SocketAddr::new(ip, port), transport })
}

/// Where a [`crate::resolver::Resolver`] gets its nameserver list from.
pub trait NameserverConfig: Send + Sync {
    fn nameservers(&self) -> Result<Vec<Nameserver>, DnsError>;
}

/// The built-in fallback: public resolvers, used when nothing else is
/// configured.
pub struct StaticConfig {
    nameservers: Vec<Nameserver>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            nameservers: vec![
                Nameserver { addr: "1.1.1.1:53".parse().unwrap(), transport: Transport::Udp },
                Nameserver { addr: "8.8.8.8:53".parse().unwrap(), transport: Transport::Udp },
            ],
        }
    }
}

impl StaticConfig {
    pub fn new(nameservers: Vec<Nameserver>) -> Self {
        Self { nameservers }
    }
}

impl NameserverConfig for StaticConfig {
    fn nameservers(&self) -> Result<Vec<Nameserver>, DnsError> {
        Ok(self.nameservers.clone())
    }
}

#[derive(Debug, Deserialize)]
struct FileConfigShape {
    nameservers: Vec<String>,
}

/// Loads nameservers from a JSON config file via the `config` crate.
pub struct FileConfig {
    path: std::path::PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl NameserverConfig for FileConfig {
    fn nameservers(&self) -> Result<Vec<Nameserver>, DnsError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(self.path.as_path()))
            .build()
            .map_err(|e| DnsError::InvalidConfiguration(format!("failed to read {}: {e}", self.path.display())))?;

        let shape: FileConfigShape = settings
            .try_deserialize()
            .map_err(|e| DnsError::InvalidConfiguration(format!("invalid config in {}: {e}", self.path.display())))?;

        shape.nameservers.iter().map(|s| parse_nameserver(s)).collect()
    }
}
