//! The DNS data model: [`Query`], [`Message`], [`Record`], [`RData`], and the
//! small wire-code enums they're built from. Values here are immutable once
//! constructed — the codec and the resolver build them, the executor stack
//! only ever reads them.

use std::net::{Ipv4Addr, Ipv6Addr};

use packed_struct::prelude::*;

/// A resource record type, tagged with its RFC 1035/2782/6844 wire code.
/// Unknown codes round-trip as [`RecordType::Unknown`] rather than erroring,
/// per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    SSHFP,
    CAA,
    Any,
    Unknown(u16),
}

impl RecordType {
    pub fn code(self) -> u16 {
        match self {
            Self::A => 1,
            Self::NS => 2,
            Self::CNAME => 5,
            Self::SOA => 6,
            Self::PTR => 12,
            Self::MX => 15,
            Self::TXT => 16,
            Self::AAAA => 28,
            Self::SRV => 33,
            Self::OPT => 41,
            Self::SSHFP => 44,
            Self::Any => 255,
            Self::CAA => 257,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u16> for RecordType {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            6 => Self::SOA,
            12 => Self::PTR,
            15 => Self::MX,
            16 => Self::TXT,
            28 => Self::AAAA,
            33 => Self::SRV,
            41 => Self::OPT,
            44 => Self::SSHFP,
            255 => Self::Any,
            257 => Self::CAA,
            other => Self::Unknown(other),
        }
    }
}

/// A resource record class. `IN` is the only one a stub resolver ever sends,
/// but the others round-trip if a server hands one back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    Internet,
    Chaos,
    Hesiod,
    Any,
    Unknown(u16),
}

impl RecordClass {
    pub fn code(self) -> u16 {
        match self {
            Self::Internet => 1,
            Self::Chaos => 3,
            Self::Hesiod => 4,
            Self::Any => 255,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u16> for RecordClass {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::Internet,
            3 => Self::Chaos,
            4 => Self::Hesiod,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }
}

impl Default for RecordClass {
    fn default() -> Self {
        Self::Internet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Query,
    IQuery,
    Status,
    Reserved(u8),
}

impl From<u8> for OpCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Query,
            1 => Self::IQuery,
            2 => Self::Status,
            other => Self::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        match op {
            OpCode::Query => 0,
            OpCode::IQuery => 1,
            OpCode::Status => 2,
            OpCode::Reserved(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(u8),
}

impl From<u8> for ResponseCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            other => Self::Reserved(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(rcode: ResponseCode) -> u8 {
        match rcode {
            ResponseCode::Ok => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Reserved(code) => code,
        }
    }
}

impl ResponseCode {
    pub fn name(self) -> crate::error::ResponseCodeName {
        use crate::error::ResponseCodeName as R;
        match self {
            Self::Ok => R::Other(0),
            Self::FormatError => R::FormatError,
            Self::ServerFailure => R::ServerFailure,
            Self::NameError => R::NonExistentDomain,
            Self::NotImplemented => R::NotImplemented,
            Self::Refused => R::Refused,
            Self::Reserved(code) => R::Other(code),
        }
    }
}

/// The 12-byte DNS header. Bit layout per RFC 1035 §4.1.1, MSB-first:
/// `QR(1) OP(4) AA(1) TC(1) RD(1) RA(1) Z(3) RCODE(4)`.
#[derive(Debug, PackedStruct, Clone, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "12")]
pub struct HeaderBits {
    #[packed_field(bits = "0..=15", endian = "msb")]
    pub id: u16,
    #[packed_field(bits = "16")]
    pub qr: bool,
    #[packed_field(bits = "17..=20", endian = "msb")]
    pub opcode: u8,
    #[packed_field(bits = "21")]
    pub aa: bool,
    #[packed_field(bits = "22")]
    pub tc: bool,
    #[packed_field(bits = "23")]
    pub rd: bool,
    #[packed_field(bits = "24")]
    pub ra: bool,
    #[packed_field(bits = "25..=27", endian = "msb")]
    pub z: u8,
    #[packed_field(bits = "28..=31", endian = "msb")]
    pub rcode: u8,
    #[packed_field(bits = "32..=47", endian = "msb")]
    pub qdcount: u16,
    #[packed_field(bits = "48..=63", endian = "msb")]
    pub ancount: u16,
    #[packed_field(bits = "64..=79", endian = "msb")]
    pub nscount: u16,
    #[packed_field(bits = "80..=95", endian = "msb")]
    pub arcount: u16,
}

/// A `(name, type, class)` tuple. Immutable; `name` never carries a trailing
/// dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

impl Query {
    pub fn new(name: impl Into<String>, qtype: RecordType) -> Self {
        Self {
            name: strip_trailing_dot(&name.into()),
            qtype,
            qclass: RecordClass::Internet,
        }
    }

    /// The cache/coalescing key: `"{name}:{type}:{class}"`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.name.to_ascii_lowercase(),
            self.qtype.code(),
            self.qclass.code()
        )
    }
}

pub(crate) fn strip_trailing_dot(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

/// Resource-record-specific payload. One arm per supported type, plus an
/// opaque fallback for anything this crate doesn't understand the shape of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Ns(String),
    Ptr(String),
    Txt(Vec<Vec<u8>>),
    Mx { priority: u16, target: String },
    Srv { priority: u16, weight: u16, port: u16, target: String },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Caa { flags: u8, tag: String, value: Vec<u8> },
    Sshfp { algorithm: u8, fingerprint_type: u8, fingerprint_hex: String },
    Unknown(Vec<u8>),
}

impl RData {
    /// The [`RecordType`] this payload corresponds to on the wire.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Aaaa(_) => RecordType::AAAA,
            Self::Cname(_) => RecordType::CNAME,
            Self::Ns(_) => RecordType::NS,
            Self::Ptr(_) => RecordType::PTR,
            Self::Txt(_) => RecordType::TXT,
            Self::Mx { .. } => RecordType::MX,
            Self::Srv { .. } => RecordType::SRV,
            Self::Soa { .. } => RecordType::SOA,
            Self::Caa { .. } => RecordType::CAA,
            Self::Sshfp { .. } => RecordType::SSHFP,
            Self::Unknown(_) => RecordType::Unknown(0),
        }
    }
}

/// `(name, type, class, ttl, data)`. `ttl` is masked to 31 bits per RFC 2181.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub data: RData,
}

impl Record {
    /// Builds a record whose [`RecordType`] is derived from `data`'s shape.
    /// Use [`Record::with_type`] for [`RData::Unknown`], whose wire type
    /// code can't be recovered from the payload alone.
    pub fn new(name: impl Into<String>, rclass: RecordClass, ttl: u32, data: RData) -> Self {
        let rtype = data.record_type();
        Self::with_type(name, rtype, rclass, ttl, data)
    }

    pub fn with_type(
        name: impl Into<String>,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        data: RData,
    ) -> Self {
        Self {
            name: name.into(),
            rtype,
            rclass,
            ttl: ttl & 0x7fff_ffff,
            data,
        }
    }
}

/// A complete DNS message, RFC 1035 §4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub is_response: bool,
    pub opcode: OpCode,
    pub is_authoritative: bool,
    pub is_truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub response_code: ResponseCode,
    pub questions: Vec<Query>,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub additional: Vec<Record>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            id: 0,
            is_response: false,
            opcode: OpCode::Query,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: false,
            response_code: ResponseCode::Ok,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

impl Message {
    /// Builds a freshly-ID'd recursive query for `q`, per spec: exactly one
    /// question, `recursion_desired = true`, all sections otherwise empty.
    pub fn create_request(q: Query) -> Self {
        Self {
            id: crate::util::random_txid(),
            recursion_desired: true,
            questions: vec![q],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strips_trailing_dot() {
        let q = Query::new("example.com.", RecordType::A);
        assert_eq!(q.name, "example.com");
    }

    #[test]
    fn record_type_round_trips_known_codes() {
        for code in [1u16, 2, 5, 6, 12, 15, 16, 28, 33, 41, 44, 255, 257] {
            assert_eq!(RecordType::from(code).code(), code);
        }
    }

    #[test]
    fn unknown_record_type_preserved() {
        let rt = RecordType::from(1234);
        assert_eq!(rt, RecordType::Unknown(1234));
        assert_eq!(rt.code(), 1234);
    }

    #[test]
    fn ttl_is_masked_to_31_bits() {
        let record = Record::new("example.com", RecordClass::Internet, 0xffff_ffff, RData::A(Ipv4Addr::LOCALHOST));
        assert_eq!(record.ttl, 0x7fff_ffff);
    }

    #[test]
    fn create_request_has_expected_shape() {
        let q = Query::new("example.com", RecordType::A);
        let m = Message::create_request(q.clone());
        assert!(m.recursion_desired);
        assert_eq!(m.questions, vec![q]);
        assert!(m.answers.is_empty() && m.authority.is_empty() && m.additional.is_empty());
    }

    #[test]
    fn cache_key_is_case_insensitive_on_name() {
        let a = Query::new("Example.COM", RecordType::A).cache_key();
        let b = Query::new("example.com", RecordType::A).cache_key();
        assert_eq!(a, b);
    }
}
