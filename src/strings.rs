//! String decoding into the arena.
//!
//! Copies a string literal's bytes into the document's string arena while
//! expanding escapes, then records it as a 4-byte little-endian length
//! prefix, the decoded payload, and a terminating zero (not counted by the
//! length). The tape word holds the arena offset of the length prefix.

use crate::document::ParsedDocument;
use crate::error::Status;
use crate::tape::TAG_STRING;

/// Decode the string literal whose opening quote is at `offset`, append its
/// record to the arena, and write its tape word.
///
/// `buf` is the padded input. Stage 1 has already verified quote parity, so
/// an unescaped closing quote exists before the end of the input.
pub(crate) fn parse_string(doc: &mut ParsedDocument, buf: &[u8], offset: usize) -> Result<(), Status> {
    let arena_offset = doc.strings.len();
    // Length prefix, patched once the payload size is known.
    doc.strings.extend_from_slice(&[0u8; 4]);
    let body_start = doc.strings.len();

    let mut i = offset + 1;
    loop {
        if i >= buf.len() {
            return Err(Status::UnclosedString);
        }
        let c = buf[i];
        match c {
            b'"' => break,
            b'\\' => {
                let Some(&escape) = buf.get(i + 1) else {
                    return Err(Status::StringError);
                };
                match escape {
                    b'"' | b'\\' | b'/' => {
                        doc.strings.push(escape);
                        i += 2;
                    }
                    b'b' => {
                        doc.strings.push(0x08);
                        i += 2;
                    }
                    b'f' => {
                        doc.strings.push(0x0C);
                        i += 2;
                    }
                    b'n' => {
                        doc.strings.push(0x0A);
                        i += 2;
                    }
                    b'r' => {
                        doc.strings.push(0x0D);
                        i += 2;
                    }
                    b't' => {
                        doc.strings.push(0x09);
                        i += 2;
                    }
                    b'u' => {
                        let (ch, consumed) = decode_unicode_escape(buf, i)?;
                        let mut utf8 = [0u8; 4];
                        doc.strings
                            .extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
                        i += consumed;
                    }
                    _ => return Err(Status::StringError),
                }
            }
            0x00..=0x1F => return Err(Status::UnescapedChars),
            _ => {
                doc.strings.push(c);
                i += 1;
            }
        }
    }

    // Escape expansion only emits complete UTF-8 sequences, so any invalid
    // sequence here came from the raw input bytes.
    if core::str::from_utf8(&doc.strings[body_start..]).is_err() {
        return Err(Status::Utf8Error);
    }

    let length = (doc.strings.len() - body_start) as u32;
    doc.strings[arena_offset..arena_offset + 4].copy_from_slice(&length.to_le_bytes());
    doc.strings.push(0);
    doc.write_tape(arena_offset as u64, TAG_STRING);
    Ok(())
}

/// Decode `\uXXXX`, pairing a high surrogate with the `\uYYYY` that must
/// follow it. `i` is the position of the backslash. Returns the decoded
/// character and the number of input bytes consumed.
fn decode_unicode_escape(buf: &[u8], i: usize) -> Result<(char, usize), Status> {
    let first = parse_hex4(buf, i + 2).ok_or(Status::StringError)?;
    if (0xD800..=0xDBFF).contains(&first) {
        if buf.get(i + 6) != Some(&b'\\') || buf.get(i + 7) != Some(&b'u') {
            return Err(Status::StringError);
        }
        let second = parse_hex4(buf, i + 8).ok_or(Status::StringError)?;
        if !(0xDC00..=0xDFFF).contains(&second) {
            return Err(Status::StringError);
        }
        let code_point = 0x10000 + (((first - 0xD800) << 10) | (second - 0xDC00));
        let ch = char::from_u32(code_point).ok_or(Status::StringError)?;
        Ok((ch, 12))
    } else if (0xDC00..=0xDFFF).contains(&first) {
        // A low surrogate with no preceding high surrogate.
        Err(Status::StringError)
    } else {
        let ch = char::from_u32(first).ok_or(Status::StringError)?;
        Ok((ch, 6))
    }
}

/// Four hex digits starting at `at`, or `None`.
fn parse_hex4(buf: &[u8], at: usize) -> Option<u32> {
    let mut value = 0u32;
    for k in 0..4 {
        let digit = (*buf.get(at + k)? as char).to_digit(16)?;
        value = (value << 4) | digit;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape;

    fn decode(literal: &[u8]) -> Result<Vec<u8>, Status> {
        let mut padded = literal.to_vec();
        padded.resize(literal.len() + 64, 0);
        let mut doc = ParsedDocument::new();
        parse_string(&mut doc, &padded, 0)?;
        let offset = tape::payload(doc.tape[0]) as usize;
        let length =
            u32::from_le_bytes(doc.strings[offset..offset + 4].try_into().unwrap()) as usize;
        assert_eq!(doc.strings[offset + 4 + length], 0, "missing NUL terminator");
        Ok(doc.strings[offset + 4..offset + 4 + length].to_vec())
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(decode(br#""hello""#).unwrap(), b"hello");
        assert_eq!(decode(br#""""#).unwrap(), b"");
    }

    #[test]
    fn test_simple_escapes() {
        assert_eq!(decode(br#""a\"b""#).unwrap(), b"a\"b");
        assert_eq!(decode(br#""a\\b""#).unwrap(), b"a\\b");
        assert_eq!(decode(br#""a\/b""#).unwrap(), b"a/b");
        assert_eq!(decode(br#""\b\f\n\r\t""#).unwrap(), b"\x08\x0C\n\r\t");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(decode(br#""\u00e9""#).unwrap(), "\u{e9}".as_bytes());
        assert_eq!(decode(br#""\u0041""#).unwrap(), b"A");
        assert_eq!(decode(br#""\u0000""#).unwrap(), b"\x00");
        assert_eq!(decode(br#""\u20ac""#).unwrap(), "\u{20ac}".as_bytes());
    }

    #[test]
    fn test_surrogate_pair() {
        // U+1F600 as a surrogate pair.
        assert_eq!(decode(br#""\ud83d\ude00""#).unwrap(), "\u{1f600}".as_bytes());
    }

    #[test]
    fn test_lone_surrogates_rejected() {
        assert_eq!(decode(br#""\ud800""#), Err(Status::StringError));
        assert_eq!(decode(br#""\ud800x""#), Err(Status::StringError));
        assert_eq!(decode(br#""\ude00""#), Err(Status::StringError));
        assert_eq!(decode(br#""\ud800A""#), Err(Status::StringError));
    }

    #[test]
    fn test_bad_escapes_rejected() {
        assert_eq!(decode(br#""\q""#), Err(Status::StringError));
        assert_eq!(decode(br#""\u12""#), Err(Status::StringError));
        assert_eq!(decode(br#""\u12g4""#), Err(Status::StringError));
    }

    #[test]
    fn test_control_characters_rejected() {
        assert_eq!(decode(b"\"a\x01b\""), Err(Status::UnescapedChars));
        assert_eq!(decode(b"\"a\x1fb\""), Err(Status::UnescapedChars));
        // 0x20 is a plain space and is fine.
        assert_eq!(decode(b"\"a b\"").unwrap(), b"a b");
    }

    #[test]
    fn test_raw_utf8_passes_through() {
        let literal = "\"héllo → 😀\"".as_bytes();
        assert_eq!(decode(literal).unwrap(), "héllo → 😀".as_bytes());
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert_eq!(decode(b"\"a\xC3\x28b\""), Err(Status::Utf8Error));
        assert_eq!(decode(b"\"\xFF\""), Err(Status::Utf8Error));
        // A truncated lead byte at the end of the string.
        assert_eq!(decode(b"\"abc\xE2\x82\""), Err(Status::Utf8Error));
    }
}
