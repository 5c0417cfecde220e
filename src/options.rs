//! Scan configuration.

use crate::elements;
use bitflags::bitflags;

bitflags! {
    /// The level-1 Segment sections a scan materializes.
    ///
    /// Sections outside the set are recorded as skipped stubs and their
    /// payloads are never read. `CLUSTER` disables early termination: when
    /// it is requested the scanner walks the Segment sequentially instead
    /// of stopping once every other requested section has been found.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sections: u16 {
        /// The EBML header document. Always parsed; accepted here for
        /// completeness.
        const EBML = 1 << 0;
        /// Segment Info (duration, timecode scale, title).
        const INFO = 1 << 1;
        /// Track definitions.
        const TRACKS = 1 << 2;
        /// Chapter editions.
        const CHAPTERS = 1 << 3;
        /// Attached files.
        const ATTACHMENTS = 1 << 4;
        /// Tagging metadata.
        const TAGS = 1 << 5;
        /// The seeking index.
        const CUES = 1 << 6;
        /// Media data clusters.
        const CLUSTER = 1 << 7;
        /// The meta-seek directory.
        const SEEK_HEAD = 1 << 8;

        /// The common metadata sections.
        const COMMON = Self::INFO.bits()
            | Self::TRACKS.bits()
            | Self::CHAPTERS.bits()
            | Self::ATTACHMENTS.bits();
        /// Every section.
        const ALL = Self::EBML.bits()
            | Self::COMMON.bits()
            | Self::TAGS.bits()
            | Self::CUES.bits()
            | Self::CLUSTER.bits()
            | Self::SEEK_HEAD.bits();
    }
}

impl Sections {
    /// The section a level-1 Segment child belongs to, if it is one of the
    /// named sections.
    pub fn for_id(id: u32) -> Option<Sections> {
        match id {
            elements::INFO => Some(Self::INFO),
            elements::TRACKS => Some(Self::TRACKS),
            elements::CHAPTERS => Some(Self::CHAPTERS),
            elements::ATTACHMENTS => Some(Self::ATTACHMENTS),
            elements::TAGS => Some(Self::TAGS),
            elements::CUES => Some(Self::CUES),
            elements::CLUSTER => Some(Self::CLUSTER),
            elements::SEEK_HEAD => Some(Self::SEEK_HEAD),
            _ => None,
        }
    }

    /// The sections the seek logic treats as located-once targets.
    pub(crate) fn seek_targets(self) -> Sections {
        self & (Self::INFO | Self::TRACKS | Self::CHAPTERS | Self::ATTACHMENTS | Self::TAGS | Self::CUES)
    }
}

impl Default for Sections {
    fn default() -> Self {
        Self::COMMON
    }
}

/// Verdict of a per-element callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackAction {
    /// Keep scanning.
    #[default]
    Continue,
    /// Terminate promptly and return the tree built so far.
    Stop,
}

/// Scan options, built with chained setters.
///
/// ```
/// use mkvscope::{ScanOptions, Sections};
///
/// let options = ScanOptions::new()
///     .sections(Sections::INFO | Sections::TAGS)
///     .binary_size_limit(Some(0));
/// assert!(!options.sections.contains(Sections::TRACKS));
/// ```
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Which level-1 sections to materialize.
    pub sections: Sections,
    /// Byte cap per binary leaf; `None` removes the cap. `SeekID` payloads
    /// are always read in full.
    pub binary_size_limit: Option<usize>,
    /// Walk Clusters sequentially when neither SeekHead nor the tail scan
    /// can locate a requested section.
    pub exhaustive_search: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanOptions {
    /// Options reading the common metadata sections with a 16-byte binary
    /// cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: Sections::COMMON,
            binary_size_limit: Some(16),
            exhaustive_search: false,
        }
    }

    /// Options reading every section with unlimited binary payloads.
    #[must_use]
    pub fn everything() -> Self {
        Self::new().sections(Sections::ALL).binary_size_limit(None)
    }

    /// Replace the section set.
    #[must_use]
    pub fn sections(mut self, sections: Sections) -> Self {
        self.sections = sections;
        self
    }

    /// Add sections to the set.
    #[must_use]
    pub fn include(mut self, sections: Sections) -> Self {
        self.sections |= sections;
        self
    }

    /// Set the per-leaf binary byte cap; `None` removes it.
    #[must_use]
    pub fn binary_size_limit(mut self, limit: Option<usize>) -> Self {
        self.binary_size_limit = limit;
        self
    }

    /// Permit sequential reading through Clusters as a last resort.
    #[must_use]
    pub fn exhaustive_search(mut self, enabled: bool) -> Self {
        self.exhaustive_search = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_common_sections() {
        let options = ScanOptions::default();
        assert_eq!(options.sections, Sections::COMMON);
        assert_eq!(options.binary_size_limit, Some(16));
        assert!(!options.exhaustive_search);
        assert!(!options.sections.contains(Sections::CLUSTER));
        assert!(!options.sections.contains(Sections::CUES));
    }

    #[test]
    fn builder_composes() {
        let options = ScanOptions::new()
            .include(Sections::TAGS)
            .binary_size_limit(None)
            .exhaustive_search(true);
        assert!(options.sections.contains(Sections::INFO));
        assert!(options.sections.contains(Sections::TAGS));
        assert_eq!(options.binary_size_limit, None);
        assert!(options.exhaustive_search);
    }

    #[test]
    fn section_ids_map() {
        assert_eq!(Sections::for_id(crate::elements::TAGS), Some(Sections::TAGS));
        assert_eq!(Sections::for_id(crate::elements::CLUSTER), Some(Sections::CLUSTER));
        assert_eq!(Sections::for_id(crate::elements::VOID), None);
    }

    #[test]
    fn seek_targets_exclude_clusters() {
        let targets = Sections::ALL.seek_targets();
        assert!(targets.contains(Sections::TAGS));
        assert!(!targets.contains(Sections::CLUSTER));
        assert!(!targets.contains(Sections::SEEK_HEAD));
    }
}
