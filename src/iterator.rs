//! Tape traversal.
//!
//! A [`TapeIterator`] is a stateful cursor over a parsed document's tape. It
//! borrows the document immutably, so any number of read paths can coexist;
//! each iterator carries its own scope stack sized to the document's depth
//! capacity.
//!
//! Navigation is O(1) per step: descending records the enclosing open's tape
//! index on the scope stack, skipping a sibling container jumps through the
//! open word's backpatched payload, and ascending pops the stack.

#[cfg(not(test))]
use alloc::vec::Vec;

use crate::document::ParsedDocument;
use crate::error::Status;
use crate::tape::{
    self, TAG_ARRAY_OPEN, TAG_DOUBLE, TAG_FALSE, TAG_INTEGER, TAG_NULL, TAG_OBJECT_OPEN,
    TAG_ROOT, TAG_STRING, TAG_TRUE,
};

/// One enclosing scope on the iterator's stack.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScopeIndex {
    /// Tape index of the scope's open word (the root marker at depth 0).
    pub(crate) start_of_scope: usize,
    /// Tag byte of the scope: `r`, `{` or `[`.
    pub(crate) scope_type: u8,
}

/// Saved cursor state, captured before a JSON-Pointer walk so failure can
/// restore the position.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    depth: usize,
    location: usize,
    current_val: u64,
    current_type: u8,
    depth_index: Vec<ScopeIndex>,
}

/// A cursor over a parsed document's tape.
///
/// Created by [`ParsedDocument::iter`]; starts positioned on the document's
/// root value.
pub struct TapeIterator<'a> {
    doc: &'a ParsedDocument,
    depth: usize,
    location: usize,
    tape_length: usize,
    current_val: u64,
    current_type: u8,
    depth_index: Vec<ScopeIndex>,
}

impl<'a> TapeIterator<'a> {
    /// Build an iterator over `doc`, positioned on the root value.
    ///
    /// Fails with the document's recorded status when the last parse did not
    /// succeed, or with [`Status::UnexpectedError`] if the tape is corrupt.
    pub fn new(doc: &'a ParsedDocument) -> Result<Self, Status> {
        if !doc.is_valid() {
            return Err(doc.status());
        }
        if doc.tape.is_empty() || tape::tag(doc.tape[0]) != TAG_ROOT {
            return Err(Status::UnexpectedError);
        }
        let mut iter = Self {
            doc,
            depth: 0,
            location: 0,
            tape_length: tape::payload(doc.tape[0]) as usize,
            current_val: doc.tape[0],
            current_type: TAG_ROOT,
            depth_index: Vec::with_capacity(doc.depth_capacity + 1),
        };
        iter.rewind();
        Ok(iter)
    }

    /// Reposition on the root value, as freshly constructed.
    pub fn rewind(&mut self) {
        self.depth_index.clear();
        self.depth_index.push(ScopeIndex {
            start_of_scope: 0,
            scope_type: TAG_ROOT,
        });
        self.depth = 0;
        self.load(0);
        if self.tape_length > 1 {
            // Step off the root marker onto the document's root value.
            self.depth = 1;
            self.load(1);
            self.depth_index.push(ScopeIndex {
                start_of_scope: 1,
                scope_type: self.current_type,
            });
        }
    }

    #[inline]
    fn load(&mut self, location: usize) {
        self.location = location;
        self.current_val = self.doc.tape[location];
        self.current_type = tape::tag(self.current_val);
    }

    /// Current nesting depth; 1 at the root value.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Tape index of the current node.
    #[inline]
    pub fn tape_location(&self) -> usize {
        self.location
    }

    /// Tag byte of the current node (see [`crate::tape`]).
    #[inline]
    pub fn get_type(&self) -> u8 {
        self.current_type
    }

    /// Tag byte of the innermost enclosing scope: `r`, `{` or `[`.
    #[inline]
    pub fn scope_type(&self) -> u8 {
        if self.depth <= 1 {
            TAG_ROOT
        } else {
            self.depth_index[self.depth].scope_type
        }
    }

    /// True if the current node is an object.
    #[inline]
    pub fn is_object(&self) -> bool {
        self.current_type == TAG_OBJECT_OPEN
    }

    /// True if the current node is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        self.current_type == TAG_ARRAY_OPEN
    }

    /// True if the current node is a string.
    #[inline]
    pub fn is_string(&self) -> bool {
        self.current_type == TAG_STRING
    }

    /// True if the current node is a signed 64-bit integer.
    #[inline]
    pub fn is_integer(&self) -> bool {
        self.current_type == TAG_INTEGER
    }

    /// True if the current node is a double.
    #[inline]
    pub fn is_double(&self) -> bool {
        self.current_type == TAG_DOUBLE
    }

    /// True if the current node is `true`.
    #[inline]
    pub fn is_true(&self) -> bool {
        self.current_type == TAG_TRUE
    }

    /// True if the current node is `false`.
    #[inline]
    pub fn is_false(&self) -> bool {
        self.current_type == TAG_FALSE
    }

    /// True if the current node is `null`.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.current_type == TAG_NULL
    }

    /// The integer value, if the current node is an integer.
    pub fn get_integer(&self) -> Option<i64> {
        if self.current_type != TAG_INTEGER || self.location + 1 >= self.tape_length {
            return None;
        }
        Some(self.doc.tape[self.location + 1] as i64)
    }

    /// The double value, if the current node is a double.
    pub fn get_double(&self) -> Option<f64> {
        if self.current_type != TAG_DOUBLE || self.location + 1 >= self.tape_length {
            return None;
        }
        Some(f64::from_bits(self.doc.tape[self.location + 1]))
    }

    /// The decoded bytes of the current string. Embedded NULs are preserved.
    pub fn get_string_bytes(&self) -> Option<&'a [u8]> {
        if self.current_type != TAG_STRING {
            return None;
        }
        let offset = tape::payload(self.current_val) as usize;
        let prefix = self.doc.strings.get(offset..offset + 4)?;
        let length = u32::from_le_bytes(prefix.try_into().ok()?) as usize;
        self.doc.strings.get(offset + 4..offset + 4 + length)
    }

    /// The current string as UTF-8 text.
    pub fn get_string(&self) -> Option<&'a str> {
        core::str::from_utf8(self.get_string_bytes()?).ok()
    }

    /// Byte length of the current string's decoded payload.
    pub fn get_string_length(&self) -> Option<u32> {
        self.get_string_bytes().map(|bytes| bytes.len() as u32)
    }

    /// Descend into the current container's first child.
    ///
    /// False if the current node is not a container or the container is
    /// empty; the cursor does not move in either case.
    pub fn down(&mut self) -> bool {
        if self.location + 1 >= self.tape_length {
            return false;
        }
        if !tape::is_open_tag(self.current_type) {
            return false;
        }
        let one_past_close = tape::payload(self.current_val) as usize;
        if one_past_close == self.location + 2 {
            // Empty container: the close word sits right after the open.
            return false;
        }
        self.depth += 1;
        self.depth_index.truncate(self.depth);
        self.depth_index.push(ScopeIndex {
            start_of_scope: self.location,
            scope_type: self.current_type,
        });
        self.load(self.location + 1);
        true
    }

    /// Ascend to the enclosing container. False at the root value.
    pub fn up(&mut self) -> bool {
        if self.depth <= 1 {
            return false;
        }
        let scope = self.depth_index[self.depth];
        self.depth -= 1;
        self.load(scope.start_of_scope);
        true
    }

    /// Advance to the next sibling in the current scope. False at the end of
    /// the scope, without moving.
    pub fn next(&mut self) -> bool {
        let next_location = if tape::is_open_tag(self.current_type) {
            // Skip the whole container through its backpatched payload.
            tape::payload(self.current_val) as usize
        } else if self.current_type == TAG_INTEGER || self.current_type == TAG_DOUBLE {
            self.location + 2
        } else {
            self.location + 1
        };
        if next_location >= self.tape_length {
            return false;
        }
        let next_val = self.doc.tape[next_location];
        let next_type = tape::tag(next_val);
        if tape::is_close_tag(next_type) || next_type == TAG_ROOT {
            return false;
        }
        self.location = next_location;
        self.current_val = next_val;
        self.current_type = next_type;
        true
    }

    /// Position on the value of the member whose key equals `key` byte for
    /// byte. Valid inside an object only.
    ///
    /// On failure the cursor position is unspecified; callers needing
    /// restoration should go through [`TapeIterator::move_to`] or snapshot
    /// around the call.
    pub fn move_to_key(&mut self, key: &[u8]) -> bool {
        if !self.is_object() {
            return false;
        }
        if self.down() {
            loop {
                let matched = self.get_string_bytes().is_some_and(|s| s == key);
                // An object's tape always carries a value after each key.
                if !self.next() {
                    break;
                }
                if matched {
                    return true;
                }
                if !self.next() {
                    break;
                }
            }
            self.up();
        }
        false
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            depth: self.depth,
            location: self.location,
            current_val: self.current_val,
            current_type: self.current_type,
            depth_index: self.depth_index.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        self.depth = snapshot.depth;
        self.location = snapshot.location;
        self.current_val = snapshot.current_val;
        self.current_type = snapshot.current_type;
        self.depth_index = snapshot.depth_index;
    }
}
