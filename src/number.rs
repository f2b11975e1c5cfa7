//! Number decoding.
//!
//! Validates the RFC 8259 number grammar and writes a two-word tape entry:
//! the tag word (`l` or `d`) followed by the raw value bits. Numbers without
//! a fraction or exponent decode as signed 64-bit integers when they fit;
//! anything else, including integer overflow, decodes as a double.
//!
//! Double decoding delegates to core's decimal parser, which is correctly
//! rounded (round-to-nearest-even). Magnitudes beyond the double range
//! round to infinity rather than erroring; this is deliberate and
//! consistent.

use crate::document::ParsedDocument;
use crate::error::Status;
use crate::stage2::is_structural_or_whitespace;
use crate::tape::{TAG_DOUBLE, TAG_INTEGER};

/// Decode the number starting at `offset` and write its tape entry.
///
/// `buf` is the padded input; the byte at `offset` is `-` or a digit.
pub(crate) fn parse_number(doc: &mut ParsedDocument, buf: &[u8], offset: usize) -> Result<(), Status> {
    let mut i = offset;
    if buf[i] == b'-' {
        i += 1;
        if i >= buf.len() || !buf[i].is_ascii_digit() {
            return Err(Status::NumberError);
        }
    }

    // Integer part. A leading zero is only legal as the whole integer part.
    let digits_start = i;
    if i < buf.len() && buf[i] == b'0' {
        i += 1;
        if i < buf.len() && buf[i].is_ascii_digit() {
            return Err(Status::NumberError);
        }
    } else {
        while i < buf.len() && buf[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return Err(Status::NumberError);
        }
    }

    let mut is_float = false;
    if i < buf.len() && buf[i] == b'.' {
        is_float = true;
        i += 1;
        let fraction_start = i;
        while i < buf.len() && buf[i].is_ascii_digit() {
            i += 1;
        }
        if i == fraction_start {
            return Err(Status::NumberError);
        }
    }
    if i < buf.len() && (buf[i] == b'e' || buf[i] == b'E') {
        is_float = true;
        i += 1;
        if i < buf.len() && (buf[i] == b'+' || buf[i] == b'-') {
            i += 1;
        }
        let exponent_start = i;
        while i < buf.len() && buf[i].is_ascii_digit() {
            i += 1;
        }
        if i == exponent_start {
            return Err(Status::NumberError);
        }
    }

    // A number must be followed by a structural character, whitespace, or
    // the end of the input.
    if i < buf.len() && !is_structural_or_whitespace(buf[i]) {
        return Err(Status::NumberError);
    }

    let span = &buf[offset..i];
    if !is_float {
        if let Some(value) = parse_i64(span) {
            doc.write_tape(0, TAG_INTEGER);
            doc.tape.push(value as u64);
            return Ok(());
        }
        // Out of i64 range: decode as a double instead.
    }

    // The span is sign, digits, dot and exponent only, so it is ASCII and
    // core's decimal-to-double parser accepts it.
    let text = core::str::from_utf8(span).map_err(|_| Status::NumberError)?;
    let value: f64 = text.parse().map_err(|_| Status::NumberError)?;
    doc.write_tape(0, TAG_DOUBLE);
    doc.tape.push(value.to_bits());
    Ok(())
}

/// Signed 64-bit decode with overflow detection.
fn parse_i64(span: &[u8]) -> Option<i64> {
    let (negative, digits) = match span.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, span),
    };
    let mut magnitude: u64 = 0;
    for &d in digits {
        magnitude = magnitude
            .checked_mul(10)?
            .checked_add(u64::from(d - b'0'))?;
    }
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        if magnitude > i64::MAX as u64 {
            return None;
        }
        Some(magnitude as i64)
    }
}
