//! Serializes a [`Message`] to an RFC 1035 wire packet. Never emits
//! compression pointers — that's a decode-only concern.

use packed_struct::prelude::*;

use super::name::encode_name;
use crate::error::DnsError;
use crate::message::{Message, Query, RData, Record};

pub fn encode_message(message: &Message) -> Result<Vec<u8>, DnsError> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&encode_header(message));

    for question in &message.questions {
        encode_question(question, &mut out)?;
    }
    for record in &message.answers {
        encode_record(record, &mut out)?;
    }
    for record in &message.authority {
        encode_record(record, &mut out)?;
    }
    for record in &message.additional {
        encode_record(record, &mut out)?;
    }

    Ok(out)
}

fn encode_header(message: &Message) -> [u8; 12] {
    let bits = crate::message::HeaderBits {
        id: message.id,
        qr: message.is_response,
        opcode: message.opcode.into(),
        aa: message.is_authoritative,
        tc: message.is_truncated,
        rd: message.recursion_desired,
        ra: message.recursion_available,
        z: 0,
        rcode: message.response_code.into(),
        qdcount: message.questions.len() as u16,
        ancount: message.answers.len() as u16,
        nscount: message.authority.len() as u16,
        arcount: message.additional.len() as u16,
    };
    bits.pack().expect("fixed-width header always packs")
}

fn encode_question(question: &Query, out: &mut Vec<u8>) -> Result<(), DnsError> {
    encode_name(&question.name, out)?;
    out.extend_from_slice(&question.qtype.code().to_be_bytes());
    out.extend_from_slice(&question.qclass.code().to_be_bytes());
    Ok(())
}

fn encode_record(record: &Record, out: &mut Vec<u8>) -> Result<(), DnsError> {
    encode_name(&record.name, out)?;
    out.extend_from_slice(&record.rtype.code().to_be_bytes());
    out.extend_from_slice(&record.rclass.code().to_be_bytes());
    out.extend_from_slice(&record.ttl.to_be_bytes());

    let rdata = encode_rdata(&record.data)?;
    if rdata.len() > u16::MAX as usize {
        return Err(DnsError::InvalidConfiguration(
            "rdata exceeds 65535 bytes".into(),
        ));
    }
    out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    out.extend_from_slice(&rdata);
    Ok(())
}

fn encode_rdata(data: &RData) -> Result<Vec<u8>, DnsError> {
    let mut out = Vec::new();
    match data {
        RData::A(addr) => out.extend_from_slice(&addr.octets()),
        RData::Aaaa(addr) => out.extend_from_slice(&addr.octets()),
        RData::Cname(name) | RData::Ns(name) | RData::Ptr(name) => encode_name(name, &mut out)?,
        RData::Txt(strings) => {
            for chunk in strings {
                if chunk.len() > 255 {
                    return Err(DnsError::InvalidConfiguration(
                        "TXT character-string exceeds 255 bytes".into(),
                    ));
                }
                out.push(chunk.len() as u8);
                out.extend_from_slice(chunk);
            }
        }
        RData::Mx { priority, target } => {
            out.extend_from_slice(&priority.to_be_bytes());
            encode_name(target, &mut out)?;
        }
        RData::Srv { priority, weight, port, target } => {
            out.extend_from_slice(&priority.to_be_bytes());
            out.extend_from_slice(&weight.to_be_bytes());
            out.extend_from_slice(&port.to_be_bytes());
            encode_name(target, &mut out)?;
        }
        RData::Soa { mname, rname, serial, refresh, retry, expire, minimum } => {
            encode_name(mname, &mut out)?;
            encode_name(rname, &mut out)?;
            for field in [serial, refresh, retry, expire, minimum] {
                out.extend_from_slice(&field.to_be_bytes());
            }
        }
        RData::Caa { flags, tag, value } => {
            let tag_bytes = tag.as_bytes();
            if tag_bytes.len() > 255 {
                return Err(DnsError::InvalidConfiguration("CAA tag too long".into()));
            }
            out.push(*flags);
            out.push(tag_bytes.len() as u8);
            out.extend_from_slice(tag_bytes);
            out.extend_from_slice(value);
        }
        RData::Sshfp { algorithm, fingerprint_type, fingerprint_hex } => {
            out.push(*algorithm);
            out.push(*fingerprint_type);
            let fingerprint = hex::decode(fingerprint_hex).map_err(|e| {
                DnsError::InvalidConfiguration(format!("invalid SSHFP fingerprint hex: {e}"))
            })?;
            out.extend_from_slice(&fingerprint);
        }
        RData::Unknown(bytes) => out.extend_from_slice(bytes),
    }
    Ok(out)
}
