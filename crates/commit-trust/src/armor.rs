//! ASCII armor decoding shared by the OpenPGP and SSH signature formats.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{TrustError, TrustResult};

fn armor_error(reason: impl Into<String>) -> TrustError {
    TrustError::Armor {
        reason: reason.into(),
    }
}

/// Decode the first `-----BEGIN {label}-----` block in `text`.
///
/// Armor headers (`Key: value`) are skipped. A trailing `=XXXX` CRC-24 line is
/// checked when present.
pub fn decode(text: &str, label: &str) -> TrustResult<Vec<u8>> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let mut lines = text.lines().map(str::trim);
    if !lines.by_ref().any(|line| line == begin) {
        return Err(armor_error(format!("missing {} header", label)));
    }

    let mut body = String::new();
    let mut checksum = None;
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        if line.is_empty() || line.contains(':') {
            continue;
        }
        if line.len() == 5 && line.starts_with('=') {
            checksum = Some(&line[1..]);
            continue;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(armor_error(format!("missing {} footer", label)));
    }

    let data = BASE64
        .decode(body.as_bytes())
        .map_err(|e| armor_error(format!("invalid base64 body: {}", e)))?;
    if data.is_empty() {
        return Err(armor_error("empty armor body"));
    }

    if let Some(checksum) = checksum {
        let expected = BASE64
            .decode(checksum.as_bytes())
            .map_err(|e| armor_error(format!("invalid checksum encoding: {}", e)))?;
        let actual = crc24(&data).to_be_bytes();
        if expected.as_slice() != &actual[1..] {
            return Err(armor_error("checksum mismatch"));
        }
    }

    Ok(data)
}

/// Encode `data` as an armor block, 64 columns per line, with checksum when
/// `with_checksum` is set.
pub fn encode(data: &[u8], label: &str, with_checksum: bool) -> String {
    let encoded = BASE64.encode(data);
    let mut out = format!("-----BEGIN {}-----\n", label);
    if with_checksum {
        out.push('\n');
    }
    for chunk in encoded.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    if with_checksum {
        let crc = crc24(data).to_be_bytes();
        out.push('=');
        out.push_str(&BASE64.encode(&crc[1..]));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// CRC-24 as used by OpenPGP armor.
pub(crate) fn crc24(data: &[u8]) -> u32 {
    let mut crc: u32 = 0x00B7_04CE;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= 0x0186_4CFB;
            }
        }
    }
    crc & 0x00FF_FFFF
}
