//! AVX2 block classification for x86_64.
//!
//! Classifies a 64-byte block as two 32-byte lanes using AVX2 byte
//! comparisons. AVX2 is available on Intel Haswell (2013+) and AMD
//! Excavator (2015+).

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use super::BlockMasks;

/// ASCII byte constants
const DOUBLE_QUOTE: i8 = b'"' as i8;
const BACKSLASH: i8 = b'\\' as i8;
const OPEN_BRACE: i8 = b'{' as i8;
const CLOSE_BRACE: i8 = b'}' as i8;
const OPEN_BRACKET: i8 = b'[' as i8;
const CLOSE_BRACKET: i8 = b']' as i8;
const COMMA: i8 = b',' as i8;
const COLON: i8 = b':' as i8;
const SPACE: i8 = b' ' as i8;
const TAB: i8 = b'\t' as i8;
const LINE_FEED: i8 = b'\n' as i8;
const CARRIAGE_RETURN: i8 = b'\r' as i8;

/// Classification masks for one 32-byte lane.
#[derive(Debug, Clone, Copy)]
struct LaneMasks {
    backslash: u32,
    quote: u32,
    structural: u32,
    whitespace: u32,
}

/// Classify 32 bytes at once using AVX2.
#[inline]
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
unsafe fn classify_lane(chunk: __m256i) -> LaneMasks {
    unsafe {
        let v_quote = _mm256_set1_epi8(DOUBLE_QUOTE);
        let v_backslash = _mm256_set1_epi8(BACKSLASH);
        let v_open_brace = _mm256_set1_epi8(OPEN_BRACE);
        let v_close_brace = _mm256_set1_epi8(CLOSE_BRACE);
        let v_open_bracket = _mm256_set1_epi8(OPEN_BRACKET);
        let v_close_bracket = _mm256_set1_epi8(CLOSE_BRACKET);
        let v_comma = _mm256_set1_epi8(COMMA);
        let v_colon = _mm256_set1_epi8(COLON);

        let eq_quote = _mm256_cmpeq_epi8(chunk, v_quote);
        let eq_backslash = _mm256_cmpeq_epi8(chunk, v_backslash);
        let eq_open_brace = _mm256_cmpeq_epi8(chunk, v_open_brace);
        let eq_close_brace = _mm256_cmpeq_epi8(chunk, v_close_brace);
        let eq_open_bracket = _mm256_cmpeq_epi8(chunk, v_open_bracket);
        let eq_close_bracket = _mm256_cmpeq_epi8(chunk, v_close_bracket);
        let eq_comma = _mm256_cmpeq_epi8(chunk, v_comma);
        let eq_colon = _mm256_cmpeq_epi8(chunk, v_colon);

        let braces = _mm256_or_si256(eq_open_brace, eq_close_brace);
        let brackets = _mm256_or_si256(eq_open_bracket, eq_close_bracket);
        let delims = _mm256_or_si256(eq_comma, eq_colon);
        let structural = _mm256_or_si256(_mm256_or_si256(braces, brackets), delims);

        let v_space = _mm256_set1_epi8(SPACE);
        let v_tab = _mm256_set1_epi8(TAB);
        let v_lf = _mm256_set1_epi8(LINE_FEED);
        let v_cr = _mm256_set1_epi8(CARRIAGE_RETURN);

        let eq_space = _mm256_cmpeq_epi8(chunk, v_space);
        let eq_tab = _mm256_cmpeq_epi8(chunk, v_tab);
        let eq_lf = _mm256_cmpeq_epi8(chunk, v_lf);
        let eq_cr = _mm256_cmpeq_epi8(chunk, v_cr);

        let whitespace = _mm256_or_si256(
            _mm256_or_si256(eq_space, eq_tab),
            _mm256_or_si256(eq_lf, eq_cr),
        );

        LaneMasks {
            backslash: _mm256_movemask_epi8(eq_backslash) as u32,
            quote: _mm256_movemask_epi8(eq_quote) as u32,
            structural: _mm256_movemask_epi8(structural) as u32,
            whitespace: _mm256_movemask_epi8(whitespace) as u32,
        }
    }
}

/// Classify the first 64 bytes of `block`, one bit per byte, LSB first.
#[cfg(target_arch = "x86_64")]
pub(crate) fn classify_block(block: &[u8]) -> BlockMasks {
    // SAFETY: dispatch only selects this kernel when AVX2 is available
    unsafe { classify_block_avx2(block) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn classify_block_avx2(block: &[u8]) -> BlockMasks {
    debug_assert!(block.len() >= 64);
    unsafe {
        let lo = _mm256_loadu_si256(block.as_ptr() as *const __m256i);
        let hi = _mm256_loadu_si256(block.as_ptr().add(32) as *const __m256i);
        let l = classify_lane(lo);
        let h = classify_lane(hi);
        BlockMasks {
            backslash: l.backslash as u64 | (h.backslash as u64) << 32,
            quote: l.quote as u64 | (h.quote as u64) << 32,
            structural: l.structural as u64 | (h.structural as u64) << 32,
            whitespace: l.whitespace as u64 | (h.whitespace as u64) << 32,
        }
    }
}
