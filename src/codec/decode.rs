//! Parses an RFC 1035 wire packet into a [`Message`]. Every read is
//! bounds-checked; anything short or malformed fails with a `QueryFailed`
//! wrapping the offending detail, per spec's "FORMAT_ERROR wraps the cause"
//! rule.

use packed_struct::prelude::*;

use super::name::decode_name;
use crate::error::DnsError;
use crate::message::{
    HeaderBits, Message, OpCode, Query, RData, Record, RecordClass, RecordType, ResponseCode,
};
use crate::util::{read_u16, read_u32};

pub fn decode_message(packet: &[u8]) -> Result<Message, DnsError> {
    if packet.len() < 12 {
        return Err(format_error("packet shorter than a DNS header"));
    }

    let header_bytes: [u8; 12] = packet[0..12].try_into().unwrap();
    let bits = HeaderBits::unpack(&header_bytes).map_err(|e| format_error(&e.to_string()))?;

    let mut message = Message {
        id: bits.id,
        is_response: bits.qr,
        opcode: OpCode::from(bits.opcode),
        is_authoritative: bits.aa,
        is_truncated: bits.tc,
        recursion_desired: bits.rd,
        recursion_available: bits.ra,
        response_code: ResponseCode::from(bits.rcode),
        questions: Vec::with_capacity(bits.qdcount as usize),
        answers: Vec::with_capacity(bits.ancount as usize),
        authority: Vec::with_capacity(bits.nscount as usize),
        additional: Vec::with_capacity(bits.arcount as usize),
    };

    let mut pos = 12usize;

    for _ in 0..bits.qdcount {
        let (name, after_name) = decode_name(packet, pos)?;
        let qtype = read_u16(packet, after_name).ok_or_else(|| format_error("truncated QTYPE"))?;
        let qclass =
            read_u16(packet, after_name + 2).ok_or_else(|| format_error("truncated QCLASS"))?;
        message.questions.push(Query {
            name,
            qtype: RecordType::from(qtype),
            qclass: RecordClass::from(qclass),
        });
        pos = after_name + 4;
    }

    for _ in 0..bits.ancount {
        let (record, next) = decode_record(packet, pos)?;
        message.answers.push(record);
        pos = next;
    }
    for _ in 0..bits.nscount {
        let (record, next) = decode_record(packet, pos)?;
        message.authority.push(record);
        pos = next;
    }
    for _ in 0..bits.arcount {
        let (record, next) = decode_record(packet, pos)?;
        message.additional.push(record);
        pos = next;
    }

    Ok(message)
}

fn decode_record(packet: &[u8], start: usize) -> Result<(Record, usize), DnsError> {
    let (name, after_name) = decode_name(packet, start)?;
    let rtype = read_u16(packet, after_name).ok_or_else(|| format_error("truncated TYPE"))?;
    let rclass =
        read_u16(packet, after_name + 2).ok_or_else(|| format_error("truncated CLASS"))?;
    let ttl = read_u32(packet, after_name + 4).ok_or_else(|| format_error("truncated TTL"))?;
    let rdlength =
        read_u16(packet, after_name + 8).ok_or_else(|| format_error("truncated RDLENGTH"))?
            as usize;

    let rdata_offset = after_name + 10;
    let rdata_end = rdata_offset
        .checked_add(rdlength)
        .filter(|&end| end <= packet.len())
        .ok_or_else(|| format_error("RDATA runs past end of packet"))?;

    let rtype = RecordType::from(rtype);
    let data = decode_rdata(packet, rtype, rdata_offset, rdlength)?;

    let record = Record::with_type(name, rtype, RecordClass::from(rclass), ttl & 0x7fff_ffff, data);
    Ok((record, rdata_end))
}

fn decode_rdata(
    packet: &[u8],
    rtype: RecordType,
    rdata_offset: usize,
    rdlength: usize,
) -> Result<RData, DnsError> {
    let rdata_end = rdata_offset + rdlength;
    let raw = || packet[rdata_offset..rdata_end].to_vec();

    let data = match rtype {
        RecordType::A => {
            if rdlength != 4 {
                return Err(format_error("A record rdata is not 4 bytes"));
            }
            let b = &packet[rdata_offset..rdata_end];
            RData::A(std::net::Ipv4Addr::new(b[0], b[1], b[2], b[3]))
        }
        RecordType::AAAA => {
            if rdlength != 16 {
                return Err(format_error("AAAA record rdata is not 16 bytes"));
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&packet[rdata_offset..rdata_end]);
            RData::Aaaa(std::net::Ipv6Addr::from(octets))
        }
        RecordType::CNAME => RData::Cname(decode_name(packet, rdata_offset)?.0),
        RecordType::NS => RData::Ns(decode_name(packet, rdata_offset)?.0),
        RecordType::PTR => RData::Ptr(decode_name(packet, rdata_offset)?.0),
        RecordType::TXT => RData::Txt(decode_txt(packet, rdata_offset, rdata_end)),
        RecordType::MX => {
            let priority =
                read_u16(packet, rdata_offset).ok_or_else(|| format_error("truncated MX priority"))?;
            let (target, _) = decode_name(packet, rdata_offset + 2)?;
            RData::Mx { priority, target }
        }
        RecordType::SRV => {
            let priority = read_u16(packet, rdata_offset)
                .ok_or_else(|| format_error("truncated SRV priority"))?;
            let weight = read_u16(packet, rdata_offset + 2)
                .ok_or_else(|| format_error("truncated SRV weight"))?;
            let port = read_u16(packet, rdata_offset + 4)
                .ok_or_else(|| format_error("truncated SRV port"))?;
            let (target, _) = decode_name(packet, rdata_offset + 6)?;
            RData::Srv { priority, weight, port, target }
        }
        RecordType::SOA => {
            let (mname, after_mname) = decode_name(packet, rdata_offset)?;
            let (rname, after_rname) = decode_name(packet, after_mname)?;
            let serial = read_u32(packet, after_rname).ok_or_else(|| format_error("truncated SOA serial"))?;
            let refresh = read_u32(packet, after_rname + 4)
                .ok_or_else(|| format_error("truncated SOA refresh"))?;
            let retry = read_u32(packet, after_rname + 8).ok_or_else(|| format_error("truncated SOA retry"))?;
            let expire = read_u32(packet, after_rname + 12)
                .ok_or_else(|| format_error("truncated SOA expire"))?;
            let minimum = read_u32(packet, after_rname + 16)
                .ok_or_else(|| format_error("truncated SOA minimum"))?;
            RData::Soa { mname, rname, serial, refresh, retry, expire, minimum }
        }
        RecordType::CAA => {
            if rdlength < 2 {
                return Err(format_error("CAA rdata too short"));
            }
            let flags = packet[rdata_offset];
            let tag_len = packet[rdata_offset + 1] as usize;
            if rdlength < 2 + tag_len {
                return Err(format_error("CAA tag runs past rdata"));
            }
            let tag_bytes = &packet[rdata_offset + 2..rdata_offset + 2 + tag_len];
            let tag = String::from_utf8_lossy(tag_bytes).into_owned();
            let value = packet[rdata_offset + 2 + tag_len..rdata_end].to_vec();
            RData::Caa { flags, tag, value }
        }
        RecordType::SSHFP => {
            if rdlength < 2 {
                return Err(format_error("SSHFP rdata too short"));
            }
            let algorithm = packet[rdata_offset];
            let fingerprint_type = packet[rdata_offset + 1];
            let fingerprint_hex = hex::encode(&packet[rdata_offset + 2..rdata_end]);
            RData::Sshfp { algorithm, fingerprint_type, fingerprint_hex }
        }
        _ => RData::Unknown(raw()),
    };
    Ok(data)
}

/// TXT rdata is a sequence of character-strings. A malformed trailing length
/// stops collection — it does not fail the whole decode.
fn decode_txt(packet: &[u8], start: usize, end: usize) -> Vec<Vec<u8>> {
    let mut strings = Vec::new();
    let mut pos = start;
    while pos < end {
        let len = packet[pos] as usize;
        let str_start = pos + 1;
        let str_end = str_start + len;
        if str_end > end {
            break;
        }
        strings.push(packet[str_start..str_end].to_vec());
        pos = str_end;
    }
    strings
}

fn format_error(reason: &str) -> DnsError {
    DnsError::QueryFailed(format!("format error: {reason}"))
}
