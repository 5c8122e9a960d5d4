//! Parses `/etc/hosts`-style files: `address hostname [alias]*`, `#`
//! comments, blank lines ignored.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use regex::Regex;

struct Entry {
    addr: IpAddr,
    names: Vec<String>,
}

/// An in-memory hosts table, case-insensitive on hostnames.
pub struct HostsFile {
    entries: Vec<Entry>,
}

impl HostsFile {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    /// Invalid address lines are skipped silently — a malformed hosts file
    /// shouldn't take down resolution of everything else in it.
    pub fn parse(contents: &str) -> Self {
        let whitespace = Regex::new(r"\s+").unwrap();
        let mut entries = Vec::new();

        for raw_line in contents.lines() {
            let line = match raw_line.split_once('#') {
                Some((before, _)) => before,
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = whitespace.split(line).filter(|f| !f.is_empty());
            let Some(addr_field) = fields.next() else { continue };
            // Stored case-preserved: lookups compare case-insensitively, but
            // PTR answers must hand back the name as written in the file.
            let names: Vec<String> = fields.map(str::to_string).collect();
            if names.is_empty() {
                continue;
            }

            let Some(addr) = parse_address(addr_field) else { continue };
            entries.push(Entry { addr, names });
        }

        Self { entries }
    }

    pub fn lookup_a(&self, name: &str) -> Vec<Ipv4Addr> {
        self.entries
            .iter()
            .filter(|e| e.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .filter_map(|e| match e.addr {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .collect()
    }

    pub fn lookup_aaaa(&self, name: &str) -> Vec<Ipv6Addr> {
        self.entries
            .iter()
            .filter(|e| e.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .filter_map(|e| match e.addr {
                IpAddr::V6(v6) => Some(v6),
                IpAddr::V4(_) => None,
            })
            .collect()
    }

    pub fn lookup_ptr(&self, addr: IpAddr) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.addr == addr)
            .flat_map(|e| e.names.first().cloned())
            .collect()
    }
}

/// Strips an IPv6 zone suffix (`fe80::1%eth0` -> `fe80::1`) before parsing.
fn parse_address(field: &str) -> Option<IpAddr> {
    let without_zone = field.split('%').next().unwrap_or(field);
    without_zone.parse().ok()
}
