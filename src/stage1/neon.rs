//! NEON block classification for ARM64.
//!
//! Classifies a 64-byte block as four 16-byte chunks using ARM NEON byte
//! comparisons. NEON is mandatory on aarch64; dispatch still probes for it
//! at runtime rather than assuming.

use core::arch::aarch64::*;

use super::BlockMasks;

/// ASCII byte constants
const DOUBLE_QUOTE: u8 = b'"';
const BACKSLASH: u8 = b'\\';
const OPEN_BRACE: u8 = b'{';
const CLOSE_BRACE: u8 = b'}';
const OPEN_BRACKET: u8 = b'[';
const CLOSE_BRACKET: u8 = b']';
const COMMA: u8 = b',';
const COLON: u8 = b':';
const SPACE: u8 = b' ';
const TAB: u8 = b'\t';
const LINE_FEED: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// Extract a bitmask from the high bit of each byte in a NEON vector.
/// Returns a u16 where bit i is set if byte i has its high bit set.
#[inline]
#[target_feature(enable = "neon")]
unsafe fn neon_movemask(v: uint8x16_t) -> u16 {
    unsafe {
        // Shift each byte right by 7 to get just the high bit
        let high_bits = vshrq_n_u8::<7>(v);

        // Shift each byte left by its lane index within a half
        let shift_amounts: [i8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7];
        let shifts = vld1q_s8(shift_amounts.as_ptr());
        let shifted = vshlq_u8(high_bits, shifts);

        // Horizontal add within each half to collapse to one byte
        let low = vget_low_u8(shifted);
        let high = vget_high_u8(shifted);
        let low_sum = vaddv_u8(low) as u16;
        let high_sum = vaddv_u8(high) as u16;

        low_sum | (high_sum << 8)
    }
}

/// Classification masks for one 16-byte chunk.
#[derive(Debug, Clone, Copy)]
struct ChunkMasks {
    backslash: u16,
    quote: u16,
    structural: u16,
    whitespace: u16,
}

/// Classify 16 bytes at once using NEON.
#[inline]
#[target_feature(enable = "neon")]
unsafe fn classify_chunk(chunk: uint8x16_t) -> ChunkMasks {
    unsafe {
        let v_quote = vdupq_n_u8(DOUBLE_QUOTE);
        let v_backslash = vdupq_n_u8(BACKSLASH);
        let v_open_brace = vdupq_n_u8(OPEN_BRACE);
        let v_close_brace = vdupq_n_u8(CLOSE_BRACE);
        let v_open_bracket = vdupq_n_u8(OPEN_BRACKET);
        let v_close_bracket = vdupq_n_u8(CLOSE_BRACKET);
        let v_comma = vdupq_n_u8(COMMA);
        let v_colon = vdupq_n_u8(COLON);

        let eq_quote = vceqq_u8(chunk, v_quote);
        let eq_backslash = vceqq_u8(chunk, v_backslash);
        let eq_open_brace = vceqq_u8(chunk, v_open_brace);
        let eq_close_brace = vceqq_u8(chunk, v_close_brace);
        let eq_open_bracket = vceqq_u8(chunk, v_open_bracket);
        let eq_close_bracket = vceqq_u8(chunk, v_close_bracket);
        let eq_comma = vceqq_u8(chunk, v_comma);
        let eq_colon = vceqq_u8(chunk, v_colon);

        let braces = vorrq_u8(eq_open_brace, eq_close_brace);
        let brackets = vorrq_u8(eq_open_bracket, eq_close_bracket);
        let delims = vorrq_u8(eq_comma, eq_colon);
        let structural = vorrq_u8(vorrq_u8(braces, brackets), delims);

        let v_space = vdupq_n_u8(SPACE);
        let v_tab = vdupq_n_u8(TAB);
        let v_lf = vdupq_n_u8(LINE_FEED);
        let v_cr = vdupq_n_u8(CARRIAGE_RETURN);

        let eq_space = vceqq_u8(chunk, v_space);
        let eq_tab = vceqq_u8(chunk, v_tab);
        let eq_lf = vceqq_u8(chunk, v_lf);
        let eq_cr = vceqq_u8(chunk, v_cr);

        let whitespace = vorrq_u8(vorrq_u8(eq_space, eq_tab), vorrq_u8(eq_lf, eq_cr));

        ChunkMasks {
            backslash: neon_movemask(eq_backslash),
            quote: neon_movemask(eq_quote),
            structural: neon_movemask(structural),
            whitespace: neon_movemask(whitespace),
        }
    }
}

/// Classify the first 64 bytes of `block`, one bit per byte, LSB first.
pub(crate) fn classify_block(block: &[u8]) -> BlockMasks {
    // SAFETY: dispatch only selects this kernel when NEON is available
    unsafe { classify_block_neon(block) }
}

#[target_feature(enable = "neon")]
unsafe fn classify_block_neon(block: &[u8]) -> BlockMasks {
    debug_assert!(block.len() >= 64);
    unsafe {
        let mut masks = BlockMasks::default();
        let mut shift = 0u32;
        while shift < 64 {
            let chunk = vld1q_u8(block.as_ptr().add(shift as usize));
            let c = classify_chunk(chunk);
            masks.backslash |= (c.backslash as u64) << shift;
            masks.quote |= (c.quote as u64) << shift;
            masks.structural |= (c.structural as u64) << shift;
            masks.whitespace |= (c.whitespace as u64) << shift;
            shift += 16;
        }
        masks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage1::scalar;

    #[test]
    fn test_neon_matches_scalar_simple() {
        if !std::arch::is_aarch64_feature_detected!("neon") {
            return;
        }

        let mut block = [0x20u8; 64];
        block[..47].copy_from_slice(br#"{"name":"value","number":12345,"array":[1,2,3]}"#);
        assert_eq!(classify_block(&block), scalar::classify_block(&block));
    }

    #[test]
    fn test_neon_matches_scalar_all_byte_values() {
        if !std::arch::is_aarch64_feature_detected!("neon") {
            return;
        }

        for start in 0..4u32 {
            let mut block = [0u8; 64];
            for (i, b) in block.iter_mut().enumerate() {
                *b = (start * 64 + i as u32) as u8;
            }
            assert_eq!(
                classify_block(&block),
                scalar::classify_block(&block),
                "mismatch in block starting at byte value {}",
                start * 64
            );
        }
    }
}
