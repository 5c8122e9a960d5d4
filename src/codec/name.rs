//! Name encoding and RFC 1035 §4.1.4 compression-pointer decoding.

use crate::error::DnsError;
use crate::message::strip_trailing_dot;

/// A label whose top two bits are `11` is a pointer; `00` is an ordinary
/// length-prefixed label. Any other pattern is invalid.
const POINTER_TAG: u8 = 0b1100_0000;
const LABEL_LEN_MASK: u8 = 0b0011_1111;

/// The RFC 1035 §4.1.4 infinite-loop guard: a name may chase at most 5
/// pointers before decoding fails.
const MAX_POINTER_JUMPS: u32 = 5;

/// Appends the wire encoding of `name` to `out`. The encoder never emits
/// compression pointers. `""` and `"."` both encode as a single zero byte;
/// any trailing dot is stripped first.
pub fn encode_name(name: &str, out: &mut Vec<u8>) -> Result<(), DnsError> {
    let name = strip_trailing_dot(name);
    if name.is_empty() {
        out.push(0);
        return Ok(());
    }

    for label in name.split('.') {
        let bytes = label.as_bytes();
        if bytes.len() > 63 {
            return Err(DnsError::InvalidConfiguration(format!(
                "label {label:?} exceeds 63 bytes"
            )));
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    Ok(())
}

/// Decodes a name starting at `start` within `packet`, following compression
/// pointers as needed. Returns the decoded dotted name and the offset in the
/// *original* stream immediately following the name (i.e. immediately after
/// a pointer's two bytes, if one was taken — only the first jump fixes this
/// return offset).
pub fn decode_name(packet: &[u8], start: usize) -> Result<(String, usize), DnsError> {
    let mut pos = start;
    let mut labels: Vec<String> = Vec::new();
    let mut jumps = 0u32;
    let mut return_offset: Option<usize> = None;
    let mut total_len = 0usize;

    loop {
        let len_byte = *packet.get(pos).ok_or_else(|| format_error("truncated name"))?;

        match len_byte & POINTER_TAG {
            0b0000_0000 => {
                if len_byte == 0 {
                    pos += 1;
                    if return_offset.is_none() {
                        return_offset = Some(pos);
                    }
                    break;
                }
                let len = len_byte as usize;
                let label_start = pos + 1;
                let label_end = label_start + len;
                let label_bytes = packet
                    .get(label_start..label_end)
                    .ok_or_else(|| format_error("label runs past end of packet"))?;
                labels.push(String::from_utf8_lossy(label_bytes).into_owned());
                total_len += len + 1;
                pos = label_end;
            }
            POINTER_TAG => {
                let second = *packet
                    .get(pos + 1)
                    .ok_or_else(|| format_error("truncated compression pointer"))?;
                let offset = (((len_byte & LABEL_LEN_MASK) as usize) << 8) | second as usize;

                if return_offset.is_none() {
                    return_offset = Some(pos + 2);
                }

                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(format_error("too many compression pointer jumps"));
                }
                pos = offset;
            }
            _ => return Err(format_error("invalid label length/pointer tag")),
        }

        if total_len > 253 {
            return Err(format_error("name exceeds 253 octets"));
        }
    }

    let name = labels.join(".");
    Ok((name, return_offset.unwrap_or(pos)))
}

fn format_error(reason: &str) -> DnsError {
    DnsError::QueryFailed(format!("format error decoding name: {reason}"))
}
