//! # mkvscope
//!
//! Matroska (`.mkv`) and WebM structure and metadata inspection.
//!
//! This crate parses the EBML element tree of a Matroska container into an
//! in-memory [`Document`] for programmatic inspection: track metadata,
//! chapters, tags, attachments, duration and cues. Media frames are left
//! as opaque binary; nothing is ever written back.
//!
//! Scanning is selective. Clusters (the bulk of the file) are skipped by
//! default, and trailing sections are reached through the SeekHead
//! directory when one exists, or a bounded tail scan when it does not, so
//! inspecting a multi-gigabyte file touches only a few kilobytes.
//!
//! ## Example
//!
//! ```no_run
//! use mkvscope::{scan_file, ScanOptions, Sections};
//!
//! let options = ScanOptions::new().include(Sections::TAGS);
//! let doc = scan_file("video.mkv", options)?;
//!
//! for segment in doc.segments() {
//!     println!("segment of {} bytes", segment.size);
//! }
//! if let Some(seg) = doc.segment_ids().first() {
//!     if let Some(duration) = doc.descend(*seg, "Info/Duration") {
//!         println!("duration: {}", duration.value.as_span().unwrap_or_default());
//!     }
//!     for video in doc.children_named(doc.child_id(*seg, "Tracks").unwrap(), "Video") {
//!         println!("video track at {}", video.path);
//!     }
//! }
//! # Ok::<(), mkvscope::MkvError>(())
//! ```
//!
//! ## Element structure
//!
//! ```text
//! EBML Header
//! Segment
//! ├── SeekHead (index of top-level elements)
//! ├── Info (timecode scale, duration, title)
//! ├── Tracks
//! │   └── TrackEntry
//! │       ├── Video
//! │       └── Audio
//! ├── Chapters (editions and chapter atoms)
//! ├── Attachments (embedded files)
//! ├── Tags (metadata)
//! ├── Cues (seeking index)
//! └── Cluster (media data; skipped unless requested)
//! ```
//!
//! Every parsed element carries its byte offsets, depth, canonical path
//! and parent link, so callers can both navigate the tree and go back to
//! the raw bytes (see [`MkvScanner::read_payload`] for attachment
//! extraction).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ebml;
pub mod elements;
pub mod error;
mod io;
mod options;
mod scanner;
mod time;
mod tree;

pub use error::{MkvError, Result};
pub use options::{CallbackAction, ScanOptions, Sections};
pub use scanner::MkvScanner;
pub use time::TimeSpan;
pub use tree::{Children, Document, Element, NodeId, RawValue, Value};

use std::fs::File;
use std::path::Path;

/// Check whether a buffer starts like a Matroska/WebM stream.
///
/// Looks for the EBML header magic; streams with leading garbage are still
/// scannable through the resynchronizing root finder.
pub fn is_mkv_signature(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == [0x1A, 0x45, 0xDF, 0xA3]
}

/// Scan a file into a document tree.
///
/// The file handle is closed when the scan finishes. To extract capped
/// binary payloads afterwards, build an [`MkvScanner`] directly and keep
/// it alive.
pub fn scan_file(path: impl AsRef<Path>, options: ScanOptions) -> Result<Document> {
    let file = File::open(path)?;
    MkvScanner::with_options(file, options)?.read_document()
}
