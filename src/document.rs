//! The parsed document container.
//!
//! A [`ParsedDocument`] owns every buffer a parse writes into: the tape, the
//! string arena, the structural index scratch, the scope stack and the padded
//! input scratch. All of them are sized once by [`ParsedDocument::allocate`]
//! and reused across parses, so parsing a stream of documents that fit the
//! configured capacity performs no allocation at all.

#[cfg(not(test))]
use alloc::vec::Vec;

use crate::error::Status;
use crate::iterator::TapeIterator;
use crate::padded::PADDING;
use crate::tape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Deepest container nesting accepted by default.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Sizing configuration for a [`ParsedDocument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capacity {
    /// Largest input, in bytes, the document will accept.
    pub bytes: usize,
    /// Deepest container nesting the document will accept.
    pub depth: usize,
}

impl Capacity {
    /// Capacity for inputs up to `bytes` long, with the default depth.
    pub fn for_input(bytes: usize) -> Self {
        Self {
            bytes,
            depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            bytes: 0,
            depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One open container on the parse-time scope stack.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScopeEntry {
    /// Tape index of the container's open word.
    pub tape_index: u32,
    /// Opening byte of the container, `{` or `[`.
    pub tag: u8,
}

/// Owns the tape, string arena and scratch buffers of one parsed document.
///
/// Not thread-safe: use one document per thread, or serialize access. A
/// document is reusable; each parse resets it in place.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub(crate) tape: Vec<u64>,
    pub(crate) strings: Vec<u8>,
    pub(crate) structural_indexes: Vec<u32>,
    /// Count of real structural offsets, excluding the trailing sentinels.
    pub(crate) n_structural_indexes: usize,
    pub(crate) scope_stack: Vec<ScopeEntry>,
    pub(crate) padded_scratch: Vec<u8>,
    pub(crate) byte_capacity: usize,
    pub(crate) depth_capacity: usize,
    pub(crate) status: Option<Status>,
    allocated: bool,
}

impl ParsedDocument {
    /// A document with no capacity. [`ParsedDocument::allocate`] must be
    /// called before the first parse.
    pub fn new() -> Self {
        Self::default()
    }

    /// A document pre-sized by `capacity`. Returns `Err(Status::MemAlloc)` if
    /// any buffer reservation fails.
    pub fn with_capacity(capacity: Capacity) -> Result<Self, Status> {
        let mut doc = Self::new();
        match doc.allocate(capacity) {
            Status::Success => Ok(doc),
            err => Err(err),
        }
    }

    /// Reserve every internal buffer for inputs up to `capacity.bytes` long
    /// and nesting up to `capacity.depth` deep.
    ///
    /// The tape is sized to one word per input byte (plus root slack), the
    /// string arena to 5/3 of the input size (the worst case for a stream of
    /// tiny strings, each of which carries a length prefix and terminator),
    /// and the structural index scratch to one offset per byte.
    pub fn allocate(&mut self, capacity: Capacity) -> Status {
        let bytes = capacity.bytes;
        let tape_words = round_up_64(bytes + 8);
        let arena_bytes = round_up_64(bytes + bytes / 2 + bytes / 6 + 32 + PADDING);
        let index_slots = bytes + 8;
        let scratch_bytes = bytes + PADDING;

        let ok = self.tape.try_reserve_exact(tape_words).is_ok()
            && self.strings.try_reserve_exact(arena_bytes).is_ok()
            && self.structural_indexes.try_reserve_exact(index_slots).is_ok()
            && self.scope_stack.try_reserve_exact(capacity.depth).is_ok()
            && self.padded_scratch.try_reserve_exact(scratch_bytes).is_ok();
        if !ok {
            return Status::MemAlloc;
        }

        self.byte_capacity = bytes;
        self.depth_capacity = capacity.depth;
        self.allocated = true;
        Status::Success
    }

    /// True once `allocate` has succeeded.
    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// The status recorded by the most recent parse, or
    /// [`Status::Uninitialized`] if the document has never been parsed into.
    #[inline]
    pub fn status(&self) -> Status {
        self.status.unwrap_or(Status::Uninitialized)
    }

    /// True iff the most recent parse completed with [`Status::Success`].
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status == Some(Status::Success)
    }

    /// Largest input this document can parse without reallocation.
    #[inline]
    pub fn byte_capacity(&self) -> usize {
        self.byte_capacity
    }

    /// Deepest nesting this document accepts.
    #[inline]
    pub fn depth_capacity(&self) -> usize {
        self.depth_capacity
    }

    /// The tape of the most recent successful parse.
    ///
    /// Empty unless [`ParsedDocument::is_valid`]. See [`crate::tape`] for the
    /// word encoding.
    #[inline]
    pub fn tape(&self) -> &[u64] {
        if self.is_valid() {
            &self.tape
        } else {
            &[]
        }
    }

    /// The string arena of the most recent successful parse.
    ///
    /// Each record is a 4-byte little-endian length, the decoded bytes, and a
    /// terminating zero. String tape words hold offsets into this slice.
    #[inline]
    pub fn string_bytes(&self) -> &[u8] {
        if self.is_valid() {
            &self.strings
        } else {
            &[]
        }
    }

    /// A traversal cursor positioned at the document root.
    ///
    /// Fails with the recorded status if the document is not valid.
    pub fn iter(&self) -> Result<TapeIterator<'_>, Status> {
        TapeIterator::new(self)
    }

    /// Rewind all write cursors. Called at the start of every parse.
    pub(crate) fn reset(&mut self) {
        self.tape.clear();
        self.strings.clear();
        self.structural_indexes.clear();
        self.n_structural_indexes = 0;
        self.scope_stack.clear();
        self.status = None;
    }

    /// Append a tape word.
    #[inline]
    pub(crate) fn write_tape(&mut self, payload: u64, tag_byte: u8) {
        self.tape.push(tape::pack(tag_byte, payload));
    }

    /// Rewrite the payload of an earlier tape word, keeping its tag.
    #[inline]
    pub(crate) fn annotate_previous_loc(&mut self, idx: usize, payload: u64) {
        let t = tape::tag(self.tape[idx]);
        self.tape[idx] = tape::pack(t, payload);
    }

    /// Index of the next tape word to be written.
    #[inline]
    pub(crate) fn current_loc(&self) -> usize {
        self.tape.len()
    }
}

#[inline]
fn round_up_64(n: usize) -> usize {
    (n + 63) & !63
}
