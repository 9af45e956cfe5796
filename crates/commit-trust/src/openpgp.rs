//! OpenPGP signature envelope handling.
//!
//! Decodes the armored signature and reads the issuer key id from the
//! signature packet. Signature verification itself belongs to the
//! [`GpgBackend`](crate::GpgBackend).

use crate::armor;
use crate::error::{TrustError, TrustResult};

const SIGNATURE_LABEL: &str = "PGP SIGNATURE";
const TAG_SIGNATURE: u8 = 2;
const SUBPACKET_ISSUER: u8 = 16;
const SUBPACKET_ISSUER_FINGERPRINT: u8 = 33;

/// A decoded OpenPGP signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgSignature {
    /// Raw signature packet, header included.
    pub packet: Vec<u8>,

    /// Signature version (3 or 4).
    pub version: u8,

    /// Issuer key id as 16 upper-case hex digits, if the packet names one.
    pub issuer_key_id: Option<String>,
}

fn packet_error(reason: impl Into<String>) -> TrustError {
    TrustError::Packet {
        reason: reason.into(),
    }
}

/// Decode an armored commit signature.
pub fn extract_signature(armored: &str) -> TrustResult<GpgSignature> {
    let data = armor::decode(armored, SIGNATURE_LABEL)?;
    parse_signature_packet(&data)
}

/// Parse the first packet of `data`, which must be a signature packet.
pub fn parse_signature_packet(data: &[u8]) -> TrustResult<GpgSignature> {
    let (tag, body, consumed) = read_packet(data)?;
    if tag != TAG_SIGNATURE {
        return Err(packet_error(format!("expected signature packet, got tag {}", tag)));
    }

    let version = *body.first().ok_or_else(|| packet_error("empty signature packet"))?;
    let issuer_key_id = match version {
        3 => Some(v3_issuer(body)?),
        4 => v4_issuer(body)?,
        other => return Err(packet_error(format!("unsupported signature version {}", other))),
    };

    Ok(GpgSignature {
        packet: data[..consumed].to_vec(),
        version,
        issuer_key_id,
    })
}

/// Returns (tag, body, total bytes consumed).
fn read_packet(data: &[u8]) -> TrustResult<(u8, &[u8], usize)> {
    let first = *data.first().ok_or_else(|| packet_error("no packet data"))?;
    if first & 0x80 == 0 {
        return Err(packet_error("invalid packet header"));
    }

    let (tag, header_len, body_len): (u8, usize, usize) = if first & 0x40 != 0 {
        let tag = first & 0x3f;
        let o1 = usize::from(*data.get(1).ok_or_else(|| packet_error("truncated length"))?);
        match o1 {
            0..=191 => (tag, 2, o1),
            192..=223 => {
                let o2 = usize::from(*data.get(2).ok_or_else(|| packet_error("truncated length"))?);
                (tag, 3, ((o1 - 192) << 8) + o2 + 192)
            }
            255 => (tag, 6, be_u32(data.get(2..6))? as usize),
            _ => return Err(packet_error("partial body lengths are not supported")),
        }
    } else {
        let tag = (first >> 2) & 0x0f;
        match first & 0x03 {
            0 => (
                tag,
                2,
                usize::from(*data.get(1).ok_or_else(|| packet_error("truncated length"))?),
            ),
            1 => (tag, 3, usize::from(be_u16(data.get(1..3))?)),
            2 => (tag, 5, be_u32(data.get(1..5))? as usize),
            _ => (tag, 1, data.len() - 1),
        }
    };

    let end = header_len
        .checked_add(body_len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| packet_error("packet body exceeds data"))?;
    Ok((tag, &data[header_len..end], end))
}

fn v3_issuer(body: &[u8]) -> TrustResult<String> {
    // version, hashed length (5), type, creation time, key id
    if body.get(1) != Some(&5) {
        return Err(packet_error("invalid v3 hashed length"));
    }
    body.get(7..15)
        .map(hex::encode_upper)
        .ok_or_else(|| packet_error("truncated v3 signature"))
}

fn v4_issuer(body: &[u8]) -> TrustResult<Option<String>> {
    let hashed_len = usize::from(be_u16(body.get(4..6))?);
    let hashed_end = 6 + hashed_len;
    let hashed = body
        .get(6..hashed_end)
        .ok_or_else(|| packet_error("truncated hashed subpackets"))?;
    let unhashed_len = usize::from(be_u16(body.get(hashed_end..hashed_end + 2))?);
    let unhashed_start = hashed_end + 2;
    let unhashed = body
        .get(unhashed_start..unhashed_start + unhashed_len)
        .ok_or_else(|| packet_error("truncated unhashed subpackets"))?;

    let mut fingerprint_id = None;
    for area in [hashed, unhashed] {
        for (kind, data) in subpackets(area)? {
            match kind {
                SUBPACKET_ISSUER if data.len() == 8 => return Ok(Some(hex::encode_upper(data))),
                // version byte followed by the fingerprint; v4 ids are its low 8 bytes
                SUBPACKET_ISSUER_FINGERPRINT
                    if data.len() == 21 && data[0] == 4 && fingerprint_id.is_none() =>
                {
                    fingerprint_id = Some(hex::encode_upper(&data[13..21]));
                }
                _ => {}
            }
        }
    }
    Ok(fingerprint_id)
}

fn subpackets(mut area: &[u8]) -> TrustResult<Vec<(u8, &[u8])>> {
    let mut out = Vec::new();
    while !area.is_empty() {
        let o1 = usize::from(area[0]);
        let (len_size, len) = match o1 {
            0..=191 => (1, o1),
            192..=254 => {
                let o2 = usize::from(*area.get(1).ok_or_else(|| packet_error("truncated subpacket"))?);
                (2, ((o1 - 192) << 8) + o2 + 192)
            }
            _ => (5, be_u32(area.get(1..5))? as usize),
        };
        if len == 0 {
            return Err(packet_error("empty subpacket"));
        }
        let end = len_size + len;
        let sub = area
            .get(len_size..end)
            .ok_or_else(|| packet_error("subpacket exceeds area"))?;
        out.push((sub[0] & 0x7f, &sub[1..]));
        area = &area[end..];
    }
    Ok(out)
}

fn be_u16(bytes: Option<&[u8]>) -> TrustResult<u16> {
    match bytes {
        Some(&[a, b]) => Ok(u16::from_be_bytes([a, b])),
        _ => Err(packet_error("truncated u16")),
    }
}

fn be_u32(bytes: Option<&[u8]>) -> TrustResult<u32> {
    match bytes {
        Some(&[a, b, c, d]) => Ok(u32::from_be_bytes([a, b, c, d])),
        _ => Err(packet_error("truncated u32")),
    }
}
