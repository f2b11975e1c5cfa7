//! Stage 1: structural indexing.
//!
//! Scans the padded input in 64-byte blocks and emits the byte offsets of
//! every structural character, opening quote, and scalar start, in order.
//! The per-block byte classification runs in a SIMD kernel; the bit algebra
//! that resolves escapes, string interiors and scalar starts is portable
//! 64-bit mask arithmetic shared by every kernel.
//!
//! The vectorized classification and the carry-based escape/string handling
//! follow:
//! - Langdale & Lemire, ["Parsing Gigabytes of JSON per Second"](https://arxiv.org/abs/1902.08318) (2019)
//!
//! ## Kernels
//!
//! - **AVX2** (x86_64): two 32-byte lanes per block
//! - **SSE4.2** (x86_64): four 16-byte chunks per block, PCMPESTRM set match
//! - **NEON** (aarch64): four 16-byte chunks per block
//! - **scalar**: portable fallback, also the reference the SIMD kernels are
//!   tested against
//!
//! The best available kernel is selected by runtime feature detection, once
//! per parse. Without the `std` feature there is no runtime detection and
//! the scalar kernel is used.

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx2;

#[cfg(target_arch = "aarch64")]
pub(crate) mod neon;

pub(crate) mod scalar;

#[cfg(target_arch = "x86_64")]
pub(crate) mod sse42;

use crate::document::ParsedDocument;
use crate::error::Status;

/// Raw per-block classification produced by a kernel.
///
/// Bit `i` of each mask refers to byte `i` of the block, LSB first. The
/// masks are unfiltered: quotes and structurals inside string literals are
/// still set here and are masked off by the portable algebra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BlockMasks {
    /// Bytes equal to `\`.
    pub backslash: u64,
    /// Bytes equal to `"` (escaped or not).
    pub quote: u64,
    /// Bytes in `{ } [ ] : ,`.
    pub structural: u64,
    /// Bytes in space, tab, LF, CR.
    pub whitespace: u64,
}

const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
const ODD_BITS: u64 = !EVEN_BITS;

/// XOR-prefix-sum over the 64 bits of `bitmask`.
///
/// Bit `i` of the result is the XOR of bits `0..=i` of the input; applied to
/// the unescaped-quote mask this turns quote positions into the mask of
/// bytes between quotes (opening quote included, closing quote excluded).
#[inline]
pub(crate) fn prefix_xor(bitmask: u64) -> u64 {
    let mut mask = bitmask;
    mask ^= mask << 1;
    mask ^= mask << 2;
    mask ^= mask << 4;
    mask ^= mask << 8;
    mask ^= mask << 16;
    mask ^= mask << 32;
    mask
}

/// Positions terminating an odd-length run of backslashes, i.e. the bytes
/// that are escaped. `prev_ends_odd` carries run state across blocks and
/// must start at 0.
#[inline]
pub(crate) fn find_odd_backslash_sequences(backslash: u64, prev_ends_odd: &mut u64) -> u64 {
    let start_edges = backslash & !(backslash << 1);
    // A run starting on an even position escapes its following byte iff the
    // run length is odd, and vice versa; the carry flips the parity of a run
    // continuing from the previous block.
    let even_start_mask = EVEN_BITS ^ *prev_ends_odd;
    let even_starts = start_edges & even_start_mask;
    let odd_starts = start_edges & !even_start_mask;

    let even_carries = backslash.wrapping_add(even_starts);
    let (mut odd_carries, ends_odd) = backslash.overflowing_add(odd_starts);
    odd_carries |= *prev_ends_odd;
    *prev_ends_odd = u64::from(ends_odd);

    let even_carry_ends = even_carries & !backslash;
    let odd_carry_ends = odd_carries & !backslash;
    let even_start_odd_end = even_carry_ends & ODD_BITS;
    let odd_start_even_end = odd_carry_ends & EVEN_BITS;
    even_start_odd_end | odd_start_even_end
}

/// Carry state threaded through the per-block finalization.
#[derive(Debug, Clone, Copy)]
struct Stage1Carries {
    /// 1 iff the previous block ended inside an odd backslash run.
    ends_odd_backslash: u64,
    /// All ones iff the previous block ended inside a string literal.
    inside_quote: u64,
    /// 1 iff the previous block's final byte was structural or whitespace.
    ends_pseudo_pred: u64,
}

impl Stage1Carries {
    fn new() -> Self {
        Self {
            ends_odd_backslash: 0,
            inside_quote: 0,
            // Byte 0 of the document may start a scalar.
            ends_pseudo_pred: 1,
        }
    }
}

/// Combine one block's raw masks into its final structural bitmask.
///
/// The result marks structural characters outside strings, opening quotes,
/// and the first byte of each scalar run.
#[inline]
fn finalize_block(masks: BlockMasks, carries: &mut Stage1Carries) -> u64 {
    let escaped = find_odd_backslash_sequences(masks.backslash, &mut carries.ends_odd_backslash);
    let quote_bits = masks.quote & !escaped;
    let quote_mask = prefix_xor(quote_bits) ^ carries.inside_quote;
    carries.inside_quote = ((quote_mask as i64) >> 63) as u64;

    let mut structurals = masks.structural & !quote_mask;
    let whitespace = masks.whitespace & !quote_mask;
    structurals |= quote_bits;

    // Pseudo-structural characters: non-whitespace bytes outside strings
    // whose predecessor is structural or whitespace. These are the first
    // bytes of numbers and keyword literals.
    let pseudo_pred = structurals | whitespace;
    let shifted_pseudo_pred = (pseudo_pred << 1) | carries.ends_pseudo_pred;
    carries.ends_pseudo_pred = pseudo_pred >> 63;
    let pseudo_structurals = shifted_pseudo_pred & !whitespace & !quote_mask;
    structurals |= pseudo_structurals;

    // Closing quotes were marked pseudo-structural by the step above; only
    // opening quotes belong in the index.
    structurals & !(quote_bits & !quote_mask)
}

/// Build the structural index for `buf[..len]` into the document.
///
/// `buf` must extend at least [`crate::PADDING`] bytes past `len`. On
/// success the document's index holds every structural offset in increasing
/// order, followed by two sentinel offsets equal to `len`.
pub(crate) fn find_structural_bits(buf: &[u8], len: usize, doc: &mut ParsedDocument) -> Status {
    if len == 0 {
        return Status::Empty;
    }

    let classify = select_kernel();
    let mut carries = Stage1Carries::new();

    let mut base = 0usize;
    while base < len {
        let masks = if base + 64 <= len {
            classify(&buf[base..])
        } else {
            // Partial final block: pad with spaces so bytes past the end
            // classify as whitespace.
            let mut tail = [0x20u8; 64];
            tail[..len - base].copy_from_slice(&buf[base..len]);
            classify(&tail)
        };

        let mut structurals = finalize_block(masks, &mut carries);
        while structurals != 0 {
            let pos = structurals.trailing_zeros() as usize;
            doc.structural_indexes.push((base + pos) as u32);
            structurals &= structurals - 1;
        }
        base += 64;
    }

    if carries.inside_quote != 0 {
        return Status::UnclosedString;
    }
    if doc.structural_indexes.is_empty() {
        return Status::Empty;
    }

    doc.n_structural_indexes = doc.structural_indexes.len();
    // Sentinels let stage 2 peek one past the final structural without a
    // bounds check.
    doc.structural_indexes.push(len as u32);
    doc.structural_indexes.push(len as u32);
    Status::Success
}

// ============================================================================
// Kernel dispatch
// ============================================================================

// Runtime dispatch when std is available (test mode or std feature).
// Priority: AVX2 > SSE4.2 > scalar.
#[cfg(all(target_arch = "x86_64", any(test, feature = "std")))]
fn select_kernel() -> fn(&[u8]) -> BlockMasks {
    if is_x86_feature_detected!("avx2") {
        avx2::classify_block
    } else if is_x86_feature_detected!("sse4.2") {
        sse42::classify_block
    } else {
        scalar::classify_block
    }
}

#[cfg(all(target_arch = "aarch64", any(test, feature = "std")))]
fn select_kernel() -> fn(&[u8]) -> BlockMasks {
    if std::arch::is_aarch64_feature_detected!("neon") {
        neon::classify_block
    } else {
        scalar::classify_block
    }
}

// Without std there is no runtime feature detection; fall back to the
// portable kernel.
#[cfg(all(
    any(target_arch = "x86_64", target_arch = "aarch64"),
    not(any(test, feature = "std"))
))]
fn select_kernel() -> fn(&[u8]) -> BlockMasks {
    scalar::classify_block
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn select_kernel() -> fn(&[u8]) -> BlockMasks {
    scalar::classify_block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Capacity, ParsedDocument};
    use crate::padded::PaddedBytes;

    fn structurals_of(input: &[u8]) -> Result<Vec<u32>, Status> {
        let padded = PaddedBytes::from_slice(input);
        let mut doc = ParsedDocument::with_capacity(Capacity::for_input(input.len())).unwrap();
        match find_structural_bits(padded.as_padded_slice(), input.len(), &mut doc) {
            Status::Success => {
                Ok(doc.structural_indexes[..doc.n_structural_indexes].to_vec())
            }
            err => Err(err),
        }
    }

    #[test]
    fn test_prefix_xor() {
        assert_eq!(prefix_xor(0), 0);
        // Quotes at 0 and 4: bytes 0..=3 are "inside".
        assert_eq!(prefix_xor(0b10001), 0b01111);
        // A lone quote keeps everything after it inside.
        assert_eq!(prefix_xor(1 << 10) >> 10, u64::MAX >> 10);
    }

    #[test]
    fn test_odd_backslash_sequences() {
        let mut carry = 0u64;
        // "\"" : backslash at 0 escapes byte 1
        assert_eq!(find_odd_backslash_sequences(0b1, &mut carry), 0b10);
        assert_eq!(carry, 0);

        // "\\\"": run of two backslashes escapes nothing
        let mut carry = 0u64;
        assert_eq!(find_odd_backslash_sequences(0b11, &mut carry), 0);

        // run of three escapes the byte after
        let mut carry = 0u64;
        assert_eq!(find_odd_backslash_sequences(0b111, &mut carry), 0b1000);
    }

    #[test]
    fn test_odd_backslash_carry_across_blocks() {
        // A single backslash as the last byte of a block escapes the first
        // byte of the next block.
        let mut carry = 0u64;
        let ends = find_odd_backslash_sequences(1 << 63, &mut carry);
        assert_eq!(ends, 0);
        assert_eq!(carry, 1);
        let ends = find_odd_backslash_sequences(0, &mut carry);
        assert_eq!(ends, 1);
        assert_eq!(carry, 0);
    }

    #[test]
    fn test_simple_object_offsets() {
        // {"a":1}
        let offsets = structurals_of(br#"{"a":1}"#).unwrap();
        assert_eq!(offsets, vec![0, 1, 4, 5, 6]);
    }

    #[test]
    fn test_structurals_inside_string_are_masked() {
        // The braces and colon inside the string must not be indexed.
        let offsets = structurals_of(br#"["{:}"]"#).unwrap();
        assert_eq!(offsets, vec![0, 1, 6]);
    }

    #[test]
    fn test_escaped_quote_stays_inside_string() {
        let offsets = structurals_of(br#"["a\"b"]"#).unwrap();
        assert_eq!(offsets, vec![0, 1, 7]);
    }

    #[test]
    fn test_scalar_starts_are_marked_once() {
        let offsets = structurals_of(b"[123, true]").unwrap();
        // [ at 0, '1' at 1, ',' at 4, 't' at 6, ] at 10
        assert_eq!(offsets, vec![0, 1, 4, 6, 10]);
    }

    #[test]
    fn test_unclosed_string_detected() {
        assert_eq!(structurals_of(br#"["abc"#), Err(Status::UnclosedString));
    }

    #[test]
    fn test_unclosed_string_with_escaped_final_quote() {
        assert_eq!(structurals_of(br#""ab\""#), Err(Status::UnclosedString));
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert_eq!(structurals_of(b""), Err(Status::Empty));
        assert_eq!(structurals_of(b"   \n\t  "), Err(Status::Empty));
    }

    #[test]
    fn test_string_spanning_block_boundary() {
        // Build an input whose string crosses the 64-byte boundary.
        let mut input = Vec::new();
        input.extend_from_slice(b"[\"");
        input.extend(core::iter::repeat(b'x').take(80));
        input.extend_from_slice(b"\", 1]");
        let offsets = structurals_of(&input).unwrap();
        assert_eq!(
            offsets,
            vec![0, 1, 83, 85, input.len() as u32 - 1],
            "open bracket, open quote, comma, number, close bracket"
        );
    }

    #[test]
    fn test_backslash_run_spanning_block_boundary() {
        // 63 filler bytes, then a backslash as byte 63 escaping the quote at
        // byte 64; the string must stay open until the final quote.
        let mut input = Vec::new();
        input.push(b'"');
        input.extend(core::iter::repeat(b'x').take(62));
        input.extend_from_slice(b"\\\"");
        input.push(b'"');
        let offsets = structurals_of(&input).unwrap();
        assert_eq!(offsets, vec![0]);
    }

    #[test]
    fn test_sentinels_appended() {
        let input = br#"{"a":1}"#;
        let padded = PaddedBytes::from_slice(input);
        let mut doc = ParsedDocument::with_capacity(Capacity::for_input(input.len())).unwrap();
        let status = find_structural_bits(padded.as_padded_slice(), input.len(), &mut doc);
        assert_eq!(status, Status::Success);
        let n = doc.n_structural_indexes;
        assert_eq!(doc.structural_indexes.len(), n + 2);
        assert_eq!(doc.structural_indexes[n], input.len() as u32);
        assert_eq!(doc.structural_indexes[n + 1], input.len() as u32);
    }
}
