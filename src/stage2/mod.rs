//! Stage 2: tape construction.
//!
//! A pushdown state machine that consumes the structural offsets emitted by
//! stage 1, enforces the RFC 8259 grammar, decodes scalars through
//! [`crate::number`] and [`crate::strings`], and writes the document tape.
//!
//! Container nesting lives on the document's scope stack. On every close the
//! open word is backpatched with the tape index one past the close, and the
//! close word points back at the open, so both directions of a skip are a
//! single tape read.

use crate::document::{ParsedDocument, ScopeEntry};
use crate::error::Status;
use crate::number::parse_number;
use crate::strings::parse_string;
use crate::tape::{
    TAG_ARRAY_CLOSE, TAG_ARRAY_OPEN, TAG_FALSE, TAG_NULL, TAG_OBJECT_CLOSE, TAG_OBJECT_OPEN,
    TAG_ROOT, TAG_TRUE,
};

/// True for bytes that may legally follow a number or keyword literal.
///
/// NUL is included so the zeroed padding terminates a scalar sitting at the
/// very end of the input.
#[inline]
pub(crate) fn is_structural_or_whitespace(c: u8) -> bool {
    matches!(
        c,
        b'{' | b'}' | b'[' | b']' | b':' | b',' | b' ' | b'\t' | b'\n' | b'\r' | 0
    )
}

/// Grammar positions of the tape machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting the root value.
    Start,
    /// After `{`: a key, or an immediate `}`.
    ObjectBegin,
    /// After a comma inside an object: a key only.
    ObjectField,
    /// After a key: a colon.
    ObjectColon,
    /// After the colon: the member's value.
    ObjectValue,
    /// After a member value: `,` or `}`.
    ObjectCommaOrEnd,
    /// After `[`: a value, or an immediate `]`.
    ArrayBegin,
    /// After a comma inside an array: a value only.
    ArrayValue,
    /// After an element: `,` or `]`.
    ArrayCommaOrEnd,
    /// Root value complete; only the end of the token stream may follow.
    DocumentEnd,
}

/// Walk the structural index stream and write the tape.
///
/// `buf` is the padded input. Stage 1 must have succeeded on the document.
pub(crate) fn build_tape(buf: &[u8], doc: &mut ParsedDocument) -> Status {
    let n = doc.n_structural_indexes;
    let indexes = core::mem::take(&mut doc.structural_indexes);
    let result = run_machine(buf, doc, &indexes[..n]);
    doc.structural_indexes = indexes;
    match result {
        Ok(()) => Status::Success,
        Err(status) => status,
    }
}

fn run_machine(buf: &[u8], doc: &mut ParsedDocument, tokens: &[u32]) -> Result<(), Status> {
    // Root marker; its payload is patched on success.
    doc.write_tape(0, TAG_ROOT);

    let mut state = State::Start;
    let mut idx = 0usize;
    loop {
        if state == State::DocumentEnd {
            if idx != tokens.len() {
                // Trailing content after the root value.
                return Err(Status::TapeError);
            }
            let total = doc.current_loc() as u64 + 1;
            doc.annotate_previous_loc(0, total);
            doc.write_tape(total, TAG_ROOT);
            return Ok(());
        }

        let Some(&offset) = tokens.get(idx) else {
            // The token stream ended mid-document.
            return Err(Status::TapeError);
        };
        idx += 1;
        let i = offset as usize;
        let c = buf[i];

        state = match state {
            State::Start => parse_value(doc, buf, i, c, State::DocumentEnd)?,
            State::ObjectBegin => match c {
                b'"' => {
                    parse_string(doc, buf, i)?;
                    State::ObjectColon
                }
                b'}' => close_scope(doc)?,
                _ => return Err(Status::TapeError),
            },
            State::ObjectField => match c {
                b'"' => {
                    parse_string(doc, buf, i)?;
                    State::ObjectColon
                }
                _ => return Err(Status::TapeError),
            },
            State::ObjectColon => match c {
                b':' => State::ObjectValue,
                _ => return Err(Status::TapeError),
            },
            State::ObjectValue => parse_value(doc, buf, i, c, State::ObjectCommaOrEnd)?,
            State::ObjectCommaOrEnd => match c {
                b',' => State::ObjectField,
                b'}' => close_scope(doc)?,
                _ => return Err(Status::TapeError),
            },
            State::ArrayBegin => match c {
                b']' => close_scope(doc)?,
                _ => parse_value(doc, buf, i, c, State::ArrayCommaOrEnd)?,
            },
            State::ArrayValue => parse_value(doc, buf, i, c, State::ArrayCommaOrEnd)?,
            State::ArrayCommaOrEnd => match c {
                b',' => State::ArrayValue,
                b']' => close_scope(doc)?,
                _ => return Err(Status::TapeError),
            },
            // Handled at the top of the loop.
            State::DocumentEnd => return Err(Status::UnexpectedError),
        };
    }
}

/// Write one value's tape entry. Containers push a scope and redirect the
/// machine into the container; scalars continue to `next_state`.
fn parse_value(
    doc: &mut ParsedDocument,
    buf: &[u8],
    i: usize,
    c: u8,
    next_state: State,
) -> Result<State, Status> {
    match c {
        b'{' => {
            open_scope(doc, TAG_OBJECT_OPEN)?;
            Ok(State::ObjectBegin)
        }
        b'[' => {
            open_scope(doc, TAG_ARRAY_OPEN)?;
            Ok(State::ArrayBegin)
        }
        b'"' => {
            parse_string(doc, buf, i)?;
            Ok(next_state)
        }
        b't' => {
            check_atom(buf, i, b"true", Status::TAtomError)?;
            doc.write_tape(0, TAG_TRUE);
            Ok(next_state)
        }
        b'f' => {
            check_atom(buf, i, b"false", Status::FAtomError)?;
            doc.write_tape(0, TAG_FALSE);
            Ok(next_state)
        }
        b'n' => {
            check_atom(buf, i, b"null", Status::NAtomError)?;
            doc.write_tape(0, TAG_NULL);
            Ok(next_state)
        }
        b'-' | b'0'..=b'9' => {
            parse_number(doc, buf, i)?;
            Ok(next_state)
        }
        _ => Err(Status::TapeError),
    }
}

/// The literal at `i` must equal `literal` and be followed by a structural
/// character, whitespace, or the end of the input.
fn check_atom(buf: &[u8], i: usize, literal: &'static [u8], error: Status) -> Result<(), Status> {
    let end = i + literal.len();
    if end >= buf.len() || &buf[i..end] != literal || !is_structural_or_whitespace(buf[end]) {
        return Err(error);
    }
    Ok(())
}

fn open_scope(doc: &mut ParsedDocument, tag_byte: u8) -> Result<(), Status> {
    if doc.scope_stack.len() >= doc.depth_capacity {
        return Err(Status::DepthError);
    }
    let tape_index = doc.current_loc() as u32;
    doc.scope_stack.push(ScopeEntry {
        tape_index,
        tag: tag_byte,
    });
    doc.write_tape(0, tag_byte);
    Ok(())
}

/// Pop the current scope, write its close word, backpatch the open, and
/// resume the parent's grammar position.
fn close_scope(doc: &mut ParsedDocument) -> Result<State, Status> {
    let Some(open) = doc.scope_stack.pop() else {
        return Err(Status::UnexpectedError);
    };
    let close_tag = if open.tag == TAG_OBJECT_OPEN {
        TAG_OBJECT_CLOSE
    } else {
        TAG_ARRAY_CLOSE
    };
    let close_index = doc.current_loc();
    doc.write_tape(open.tape_index as u64, close_tag);
    doc.annotate_previous_loc(open.tape_index as usize, close_index as u64 + 1);

    Ok(match doc.scope_stack.last() {
        None => State::DocumentEnd,
        Some(parent) if parent.tag == TAG_OBJECT_OPEN => State::ObjectCommaOrEnd,
        Some(_) => State::ArrayCommaOrEnd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_or_whitespace() {
        for c in [b'{', b'}', b'[', b']', b':', b',', b' ', b'\t', b'\n', b'\r', 0] {
            assert!(is_structural_or_whitespace(c), "{:?}", c as char);
        }
        for c in [b'a', b'1', b'"', b'-', b'.', 0x1F, 0x80] {
            assert!(!is_structural_or_whitespace(c), "{:?}", c as char);
        }
    }
}
