//! # tapejson
//!
//! SIMD-accelerated JSON parsing onto a compact 64-bit tape.
//!
//! Parsing runs in two stages. Stage 1 classifies the input in 64-byte
//! blocks with vector instructions and emits the offset of every structural
//! character and scalar start; stage 2 walks those offsets through a
//! pushdown state machine that validates the grammar (exactly RFC 8259),
//! decodes numbers and strings, and writes the document tree as a tape of
//! tagged 64-bit words. A [`TapeIterator`] then navigates the tape in O(1)
//! per step and resolves RFC 6901 JSON Pointers.
//!
//! The structural scan follows Langdale & Lemire,
//! ["Parsing Gigabytes of JSON per Second"](https://arxiv.org/abs/1902.08318) (2019).
//!
//! ## Quick Start
//!
//! ```
//! use tapejson::build;
//!
//! let doc = build(br#"{"name":"Alice","age":30}"#);
//! assert!(doc.is_valid());
//!
//! let mut iter = doc.iter().unwrap();
//! assert!(iter.move_to_key(b"age"));
//! assert_eq!(iter.get_integer(), Some(30));
//!
//! assert!(iter.move_to(b"/name"));
//! assert_eq!(iter.get_string(), Some("Alice"));
//! ```
//!
//! ## Reusing a document
//!
//! A [`ParsedDocument`] owns every buffer a parse needs. Allocate it once
//! for the largest expected input and parse repeatedly without further
//! allocation:
//!
//! ```
//! use tapejson::{parse, Capacity, ParsedDocument, Status};
//!
//! let mut doc = ParsedDocument::with_capacity(Capacity::for_input(1 << 20)).unwrap();
//! assert_eq!(parse(br#"[1,2,3]"#, &mut doc), Status::Success);
//! assert_eq!(parse(br#"{"reused":true}"#, &mut doc), Status::Success);
//! ```
//!
//! ## Features
//!
//! - `std` (default): runtime CPU feature detection (AVX2, SSE4.2, NEON) and
//!   `std::error::Error` impls. Without it the crate is `no_std` + `alloc`
//!   and uses the portable scalar kernel.
//! - `serde`: `Serialize`/`Deserialize` derives on [`Capacity`].

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

mod document;
mod error;
mod iterator;
mod number;
mod padded;
mod pointer;
mod stage1;
mod stage2;
mod strings;
pub mod tape;

pub use document::{Capacity, ParsedDocument, DEFAULT_MAX_DEPTH};
pub use error::Status;
pub use iterator::TapeIterator;
pub use padded::{PaddedBytes, PADDING};

/// Parse `input` into a pre-sized document, copying it into the document's
/// padded scratch buffer first.
///
/// The returned status is also recorded on the document. The document must
/// have been sized with [`ParsedDocument::allocate`] (or
/// [`ParsedDocument::with_capacity`]) for at least `input.len()` bytes.
pub fn parse(input: &[u8], doc: &mut ParsedDocument) -> Status {
    let status = parse_copied(input, doc);
    doc.status = Some(status);
    status
}

/// Parse an already padded input without copying it.
///
/// [`PaddedBytes`] guarantees the zeroed read-ahead region stage 1 and the
/// scalar decoders rely on, so the input is borrowed as-is for the duration
/// of the parse.
pub fn parse_padded(input: &PaddedBytes, doc: &mut ParsedDocument) -> Status {
    let status = if !doc.is_allocated() {
        Status::Uninitialized
    } else if input.len() > doc.byte_capacity {
        Status::Capacity
    } else {
        doc.reset();
        run_stages(input.as_padded_slice(), input.len(), doc)
    };
    doc.status = Some(status);
    status
}

/// Allocate a document sized for `input` and parse into it.
///
/// Check [`ParsedDocument::is_valid`] (or [`ParsedDocument::status`]) on the
/// result; allocation failure surfaces there as [`Status::MemAlloc`].
#[must_use]
pub fn build(input: &[u8]) -> ParsedDocument {
    match ParsedDocument::with_capacity(Capacity::for_input(input.len())) {
        Ok(mut doc) => {
            parse(input, &mut doc);
            doc
        }
        Err(status) => {
            let mut doc = ParsedDocument::new();
            doc.status = Some(status);
            doc
        }
    }
}

/// Allocate a document sized for `input` and parse it without copying.
#[must_use]
pub fn build_padded(input: &PaddedBytes) -> ParsedDocument {
    match ParsedDocument::with_capacity(Capacity::for_input(input.len())) {
        Ok(mut doc) => {
            parse_padded(input, &mut doc);
            doc
        }
        Err(status) => {
            let mut doc = ParsedDocument::new();
            doc.status = Some(status);
            doc
        }
    }
}

fn parse_copied(input: &[u8], doc: &mut ParsedDocument) -> Status {
    if !doc.is_allocated() {
        return Status::Uninitialized;
    }
    if input.len() > doc.byte_capacity {
        return Status::Capacity;
    }
    doc.reset();

    // Stage the input into the document-owned scratch buffer; its reserved
    // capacity covers byte_capacity + PADDING, so this never reallocates.
    doc.padded_scratch.clear();
    doc.padded_scratch.extend_from_slice(input);
    doc.padded_scratch.resize(input.len() + PADDING, 0);

    let scratch = core::mem::take(&mut doc.padded_scratch);
    let status = run_stages(&scratch, input.len(), doc);
    doc.padded_scratch = scratch;
    status
}

fn run_stages(buf: &[u8], len: usize, doc: &mut ParsedDocument) -> Status {
    let stage1_status = stage1::find_structural_bits(buf, len, doc);
    if !stage1_status.is_success() {
        return stage1_status;
    }
    stage2::build_tape(buf, doc)
}
