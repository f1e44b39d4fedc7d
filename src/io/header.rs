//! Raw FITS header scanning.
//!
//! The compat file API reads cards by name only, but full header
//! pass-through needs every card of the input enumerated. FITS headers are
//! plain text: 2880-byte blocks of 36 80-character cards, terminated by an
//! `END` card, with each data unit padded to the next block boundary. This
//! scanner walks the file once and returns the cards of every HDU, in file
//! order, typed as they appear.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::frame::{CardValue, FrameHeader};

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Parse one 80-byte card into a keyword and typed value.
///
/// `None` for commentary (`COMMENT`/`HISTORY`/blank) and structural `END`
/// cards, and for anything without the `= ` value indicator.
fn parse_card(card: &[u8]) -> Option<(String, CardValue)> {
    let keyword = String::from_utf8_lossy(&card[..8]).trim().to_string();
    if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" || keyword == "END" {
        return None;
    }
    if &card[8..10] != b"= " {
        return None;
    }
    let field = String::from_utf8_lossy(&card[10..]).trim().to_string();

    // Quoted string: content up to the closing quote, trailing pad trimmed.
    if let Some(rest) = field.strip_prefix('\'') {
        let end = rest.find('\'')?;
        return Some((keyword, CardValue::Str(rest[..end].trim_end().to_string())));
    }

    // Strip any inline comment after "/".
    let value = match field.find('/') {
        Some(slash) => field[..slash].trim(),
        None => field.as_str(),
    };
    let value = match value {
        "T" => CardValue::Bool(true),
        "F" => CardValue::Bool(false),
        _ => {
            if let Ok(i) = value.parse::<i64>() {
                CardValue::Int(i)
            } else if let Ok(f) = value.parse::<f64>() {
                CardValue::Float(f)
            } else {
                CardValue::Str(value.to_string())
            }
        }
    };
    Some((keyword, value))
}

/// Bytes occupied by the HDU's data unit, before block padding.
fn data_len(header: &FrameHeader) -> u64 {
    let naxis = header.get("NAXIS").unwrap_or(0.0) as usize;
    if naxis == 0 {
        return 0;
    }
    let bitpix = header.get("BITPIX").unwrap_or(8.0) as i64;
    let mut pixels: u64 = 1;
    for axis in 1..=naxis {
        pixels *= header.get(&format!("NAXIS{axis}")).unwrap_or(0.0) as u64;
    }
    let mut len = pixels * bitpix.unsigned_abs() / 8;
    if let Some(pcount) = header.get("PCOUNT") {
        len += pcount as u64;
    }
    len
}

/// Read every HDU's header cards, in file order.
pub fn scan_headers<P: AsRef<Path>>(path: P) -> io::Result<Vec<FrameHeader>> {
    let mut file = File::open(path)?;
    let mut headers = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let mut header = FrameHeader::new();
        let mut found_end = false;

        while !found_end {
            let mut block = [0u8; BLOCK_SIZE];
            if file.read_exact(&mut block).is_err() {
                // Clean EOF between HDUs.
                return Ok(headers);
            }
            offset += BLOCK_SIZE as u64;

            for card in block.chunks_exact(CARD_SIZE) {
                if &card[..8] == b"END     " {
                    found_end = true;
                    break;
                }
                if let Some((keyword, value)) = parse_card(card) {
                    header.insert_card(&keyword, value);
                }
            }
        }

        // Skip the padded data unit to land on the next HDU's header.
        let padded = data_len(&header).div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64;
        offset += padded;
        file.seek(SeekFrom::Start(offset))?;
        headers.push(header);
    }
}
