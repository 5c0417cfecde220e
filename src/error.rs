//! Error types for Matroska tree scanning.
//!
//! Only a handful of conditions abort a scan: an unrecognizable file, an
//! element that extends past its container or the end of the stream, and I/O
//! failures. Everything else (unknown IDs, odd float sizes, out-of-spec
//! multiplicity) is recovered locally and reported through the `tracing`
//! side channel without changing the shape of the tree.

use thiserror::Error;

/// Matroska scan error.
#[derive(Error, Debug)]
pub enum MkvError {
    /// Neither an EBML header nor a Segment could be located in the stream.
    #[error("not a Matroska file: no EBML or Segment magic found")]
    NotAMatroskaFile,

    /// A declared element size extends past its container or the end of the
    /// stream.
    #[error("truncated element at offset {offset}: {size} payload bytes exceed boundary {boundary}")]
    TruncatedElement {
        /// Byte offset of the element header.
        offset: u64,
        /// Declared payload size.
        size: u64,
        /// The container or stream boundary that was exceeded.
        boundary: u64,
    },

    /// An element ID with an invalid leading byte (`0x00` or `0xFF`).
    #[error("invalid element ID at offset {offset}")]
    InvalidElementId {
        /// Byte offset of the offending byte.
        offset: u64,
    },

    /// A variable-length integer with an invalid leading byte.
    #[error("invalid VINT encoding at offset {offset}")]
    InvalidVint {
        /// Byte offset of the offending byte.
        offset: u64,
    },

    /// A variable-length integer longer than 8 octets.
    #[error("VINT at offset {offset} exceeds the maximum representable width")]
    VintOverflow {
        /// Byte offset of the VINT.
        offset: u64,
    },

    /// Container nesting deeper than the scanner supports.
    #[error("element nesting exceeds depth {depth}")]
    RecursionLimit {
        /// The depth at which recursion stopped.
        depth: u32,
    },

    /// The byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, MkvError>;
