//! Parse status codes.
//!
//! Every parse records exactly one [`Status`]. The numeric values are stable:
//! `Success` is 0 and the remaining codes follow in declaration order, so the
//! integer form can cross FFI or logging boundaries unchanged.

use core::fmt;

/// Outcome of a parse, or of an operation on a [`crate::ParsedDocument`].
///
/// Obtained from [`crate::parse`] and friends, and retained on the document
/// (see [`crate::ParsedDocument::status`]).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The document parsed completely and the tape is readable.
    Success = 0,
    /// The input is larger than the document's allocated capacity.
    Capacity,
    /// A buffer allocation failed.
    MemAlloc,
    /// The structural grammar was violated (misplaced token, unmatched close,
    /// trailing content after the root value).
    TapeError,
    /// Container nesting exceeded the document's depth capacity.
    DepthError,
    /// A string contains a malformed escape or an unpaired surrogate.
    StringError,
    /// A token starting with `t` is not the literal `true`.
    TAtomError,
    /// A token starting with `f` is not the literal `false`.
    FAtomError,
    /// A token starting with `n` is not the literal `null`.
    NAtomError,
    /// A number is malformed.
    NumberError,
    /// A decoded string is not valid UTF-8.
    Utf8Error,
    /// The document has no capacity allocated, or has never been parsed into.
    Uninitialized,
    /// The input contains no JSON value (empty or whitespace only).
    Empty,
    /// A string contains a raw control character below 0x20.
    UnescapedChars,
    /// A string literal was still open at the end of the input.
    UnclosedString,
    /// An internal invariant failed. Should not be observable.
    UnexpectedError,
}

impl Status {
    /// True for [`Status::Success`] only.
    #[inline]
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// The stable integer form of the code.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Status::Success => "no error",
            Status::Capacity => "input exceeds the document's allocated capacity",
            Status::MemAlloc => "memory allocation failed",
            Status::TapeError => "structural error in the JSON grammar",
            Status::DepthError => "nesting deeper than the document's depth capacity",
            Status::StringError => "invalid string escape",
            Status::TAtomError => "invalid literal beginning with 't'",
            Status::FAtomError => "invalid literal beginning with 'f'",
            Status::NAtomError => "invalid literal beginning with 'n'",
            Status::NumberError => "invalid number",
            Status::Utf8Error => "invalid UTF-8 in string",
            Status::Uninitialized => "document is uninitialized",
            Status::Empty => "no JSON value found in input",
            Status::UnescapedChars => "unescaped control character in string",
            Status::UnclosedString => "unclosed string",
            Status::UnexpectedError => "unexpected internal error",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Status {}
