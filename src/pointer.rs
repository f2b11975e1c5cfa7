//! JSON Pointer resolution (RFC 6901), plus the URI-fragment form.
//!
//! Pointers are resolved by driving the [`TapeIterator`] from the document
//! root. The cursor is snapshotted first; any decode error or missed
//! referent restores the snapshot, so a failed `move_to` leaves the iterator
//! where it was.
//!
//! Token decoding accepts three layers:
//! - `~1` → `/` and `~0` → `~` (RFC 6901); a `~` followed by anything else
//!   is kept literally,
//! - `\\`, `\"` and `\x` for `x <= 0x1F`, mirroring the escaped form keys
//!   carry on the tape,
//! - in the `#` fragment form, `%HH` percent-decoding applied first, with a
//!   `\` prepended to decoded `\`, `"` and control bytes so the result
//!   matches the token escapes above.

#[cfg(not(test))]
use alloc::vec::Vec;

use crate::iterator::TapeIterator;

impl<'a> TapeIterator<'a> {
    /// Position on the node addressed by `pointer`, starting from the root.
    ///
    /// Accepts the plain RFC 6901 form (empty, or starting with `/`) and the
    /// fragment form (starting with `#`). Returns false and restores the
    /// prior position if the pointer is malformed or addresses nothing. The
    /// array token `-` positions on the last element of the array.
    pub fn move_to(&mut self, pointer: &[u8]) -> bool {
        let decoded;
        let pointer = if pointer.first() == Some(&b'#') {
            match decode_fragment(&pointer[1..]) {
                Some(bytes) => {
                    decoded = bytes;
                    &decoded[..]
                }
                None => return false,
            }
        } else {
            pointer
        };

        let saved = self.snapshot();
        self.rewind();
        let found = self.relative_move_to(pointer);
        if !found {
            self.restore(saved);
        }
        found
    }

    /// Resolve `pointer` relative to the current node.
    fn relative_move_to(&mut self, pointer: &[u8]) -> bool {
        if pointer.is_empty() {
            return true;
        }
        if pointer[0] != b'/' {
            return false;
        }

        // The `-` token denotes the past-the-end position of an array; the
        // cursor settles on the last element.
        if self.is_array() && pointer.get(1) == Some(&b'-') {
            if pointer.len() != 2 {
                return false;
            }
            if !self.down() {
                return false;
            }
            while self.next() {}
            return true;
        }

        let in_array = self.is_array();
        let mut token: Vec<u8> = Vec::new();
        let mut offset = 1;
        while offset < pointer.len() {
            let c = pointer[offset];
            if c == b'/' {
                break;
            }
            if in_array && !c.is_ascii_digit() {
                // Array indexes are strict decimal integers.
                return false;
            }
            if c == b'~' {
                match pointer.get(offset + 1) {
                    Some(&b'1') => {
                        token.push(b'/');
                        offset += 2;
                        continue;
                    }
                    Some(&b'0') => {
                        token.push(b'~');
                        offset += 2;
                        continue;
                    }
                    _ => {}
                }
            }
            if c == b'\\' {
                match pointer.get(offset + 1) {
                    Some(&escaped) if escaped == b'\\' || escaped == b'"' || escaped <= 0x1F => {
                        token.push(escaped);
                        offset += 2;
                        continue;
                    }
                    _ => return false,
                }
            }
            token.push(c);
            offset += 1;
        }

        if self.is_object() {
            if self.move_to_key(&token) {
                return self.relative_move_to(&pointer[offset..]);
            }
        } else if self.is_array() {
            if self.down() {
                let Some(index) = parse_array_index(&token) else {
                    return false;
                };
                let mut i = 0u32;
                while i < index {
                    if !self.next() {
                        break;
                    }
                    i += 1;
                }
                if i == index {
                    return self.relative_move_to(&pointer[offset..]);
                }
            }
        }
        false
    }
}

/// Percent-decode a fragment pointer body, re-escaping bytes that appear
/// escaped in tape keys.
fn decode_fragment(fragment: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(fragment.len());
    let mut i = 0;
    while i < fragment.len() {
        let c = fragment[i];
        if c == b'%' {
            let hi = hex_digit(*fragment.get(i + 1)?)?;
            let lo = hex_digit(*fragment.get(i + 2)?)?;
            let byte = (hi << 4) | lo;
            if byte == b'\\' || byte == b'"' || byte <= 0x1F {
                decoded.push(b'\\');
            }
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(c);
            i += 1;
        }
    }
    Some(decoded)
}

#[inline]
fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Strict non-negative decimal index; overflow fails the lookup.
fn parse_array_index(token: &[u8]) -> Option<u32> {
    if token.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &d in token {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u32::from(d - b'0'))?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_index() {
        assert_eq!(parse_array_index(b"0"), Some(0));
        assert_eq!(parse_array_index(b"42"), Some(42));
        assert_eq!(parse_array_index(b""), None);
        assert_eq!(parse_array_index(b"1a"), None);
        assert_eq!(parse_array_index(b"99999999999999999999"), None);
    }

    #[test]
    fn test_decode_fragment() {
        assert_eq!(decode_fragment(b"/foo"), Some(b"/foo".to_vec()));
        assert_eq!(decode_fragment(b"/a%20b"), Some(b"/a b".to_vec()));
        // Decoded specials gain a backslash so they match escaped key forms.
        assert_eq!(decode_fragment(b"/a%22b"), Some(b"/a\\\"b".to_vec()));
        assert_eq!(decode_fragment(b"/a%5Cb"), Some(b"/a\\\\b".to_vec()));
        assert_eq!(decode_fragment(b"/%"), None);
        assert_eq!(decode_fragment(b"/%2"), None);
        assert_eq!(decode_fragment(b"/%zz"), None);
    }
}
