//! Matroska element definitions and the schema table.
//!
//! The schema drives parsing: every known element carries its EBML ID, data
//! type, declared parent, multiplicity, and the flags that alter lookup
//! (global elements may appear anywhere, recursive containers may nest
//! themselves). Lookup of an ID not legal under its container falls back to
//! the global table and then to "unknown".

use std::collections::HashMap;
use std::sync::OnceLock;

// =============================================================================
// Element IDs referenced by the scanner
// =============================================================================

/// EBML header element.
pub const EBML: u32 = 0x1A45_DFA3;
/// EBML DocType.
pub const DOC_TYPE: u32 = 0x4282;
/// Segment, the root container for all Matroska data.
pub const SEGMENT: u32 = 0x1853_8067;
/// SeekHead, the index of top-level elements.
pub const SEEK_HEAD: u32 = 0x114D_9B74;
/// Seek entry.
pub const SEEK: u32 = 0x4DBB;
/// Seek ID (the raw element ID the entry points at).
pub const SEEK_ID: u32 = 0x53AB;
/// Seek position, relative to the Segment payload start.
pub const SEEK_POSITION: u32 = 0x53AC;
/// Segment Info.
pub const INFO: u32 = 0x1549_A966;
/// Timecode scale: nanoseconds per timecode unit.
pub const TIMECODE_SCALE: u32 = 0x2AD7_B1;
/// Segment duration, in timecode units.
pub const DURATION: u32 = 0x4489;
/// Date UTC, nanoseconds since 2001-01-01.
pub const DATE_UTC: u32 = 0x4461;
/// Cluster (media data; skipped unless requested).
pub const CLUSTER: u32 = 0x1F43_B675;
/// Cluster timecode.
pub const TIMECODE: u32 = 0xE7;
/// BlockGroup.
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block duration, in timecode units.
pub const BLOCK_DURATION: u32 = 0x9B;
/// Tracks.
pub const TRACKS: u32 = 0x1654_AE6B;
/// TrackEntry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track type code.
pub const TRACK_TYPE: u32 = 0x83;
/// Default frame duration in nanoseconds.
pub const DEFAULT_DURATION: u32 = 0x23E3_83;
/// Default decoded field duration in nanoseconds.
pub const DEFAULT_DECODED_FIELD_DURATION: u32 = 0x234E_7A;
/// Cues (the seeking index).
pub const CUES: u32 = 0x1C53_BB6B;
/// CuePoint.
pub const CUE_POINT: u32 = 0xBB;
/// Cue time, in timecode units.
pub const CUE_TIME: u32 = 0xB3;
/// CueTrackPositions.
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// Cue duration, in timecode units.
pub const CUE_DURATION: u32 = 0xB2;
/// Chapters.
pub const CHAPTERS: u32 = 0x1043_A770;
/// EditionEntry.
pub const EDITION_ENTRY: u32 = 0x45B9;
/// ChapterAtom (may nest itself).
pub const CHAPTER_ATOM: u32 = 0xB6;
/// Chapter start time in nanoseconds (not timecode-scaled).
pub const CHAPTER_TIME_START: u32 = 0x91;
/// Chapter end time in nanoseconds (not timecode-scaled).
pub const CHAPTER_TIME_END: u32 = 0x92;
/// Attachments.
pub const ATTACHMENTS: u32 = 0x1941_A469;
/// AttachedFile.
pub const ATTACHED_FILE: u32 = 0x61A7;
/// Attached file name.
pub const FILE_NAME: u32 = 0x466E;
/// Attached file payload.
pub const FILE_DATA: u32 = 0x465C;
/// Tags.
pub const TAGS: u32 = 0x1254_C367;
/// Tag.
pub const TAG: u32 = 0x7373;
/// SimpleTag (may nest itself).
pub const SIMPLE_TAG: u32 = 0x67C8;
/// Void filler (global).
pub const VOID: u32 = 0xEC;
/// CRC-32 (global).
pub const CRC32: u32 = 0xBF;
/// SignatureSlot (global, legacy EBML signing).
pub const SIGNATURE_SLOT: u32 = 0x1B53_8667;

// =============================================================================
// Schema
// =============================================================================

/// Data type of an element per the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Container of further elements.
    Master,
    /// Big-endian unsigned integer, 0-8 octets.
    Unsigned,
    /// Big-endian two's-complement integer, 0-8 octets.
    Signed,
    /// IEEE-754 float of 4 or 8 octets, or 80-bit extended precision.
    Float,
    /// Nanoseconds since 2001-01-01T00:00:00Z, 8 octets.
    Date,
    /// UTF-8 string.
    String,
    /// Opaque bytes.
    Binary,
    /// Not in the schema.
    Unknown,
}

impl ElementKind {
    /// The type name as seen by tree consumers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "container",
            Self::Unsigned => "uint",
            Self::Signed => "int",
            Self::Float => "float",
            Self::Date => "date",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Unknown => "unknown",
        }
    }
}

/// Default value substituted for an absent or zero-sized element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    /// Unsigned integer default.
    Unsigned(u64),
    /// Float default.
    Float(f64),
    /// String default.
    Str(&'static str),
}

/// May occur more than once under its parent.
const MULT: u8 = 1 << 0;
/// May occur at any depth (Void, CRC-32, SignatureSlot).
const GLOBAL: u8 = 1 << 1;
/// The container may contain a child of its own type.
const RECURSE: u8 = 1 << 2;
/// The container may declare the unknown-size sentinel.
const UNSIZED: u8 = 1 << 3;

/// One schema entry.
#[derive(Debug)]
pub struct ElementDef {
    /// Canonical element name, used for paths and child keys.
    pub name: &'static str,
    /// EBML ID with the marker bit retained.
    pub id: u32,
    /// Data type.
    pub kind: ElementKind,
    /// ID of the declared parent container; `0` for top-level elements.
    pub parent: u32,
    flags: u8,
    /// Default substituted when the element is absent or zero-sized.
    pub default: Option<DefaultValue>,
}

impl ElementDef {
    /// Whether the schema declares this element with multiplicity > 1.
    pub fn is_multiple(&self) -> bool {
        self.flags & MULT != 0
    }

    /// Whether the element may appear at any depth.
    pub fn is_global(&self) -> bool {
        self.flags & GLOBAL != 0
    }

    /// Whether the container may nest a child of its own type.
    pub fn is_recursive(&self) -> bool {
        self.flags & RECURSE != 0
    }

    /// Whether the container may use the unknown-size sentinel.
    pub fn allows_unknown_size(&self) -> bool {
        self.flags & UNSIZED != 0
    }

    /// Whether this is a container.
    pub fn is_master(&self) -> bool {
        self.kind == ElementKind::Master
    }
}

const fn def(name: &'static str, id: u32, kind: ElementKind, parent: u32, flags: u8) -> ElementDef {
    ElementDef { name, id, kind, parent, flags, default: None }
}

const fn defv(
    name: &'static str,
    id: u32,
    kind: ElementKind,
    parent: u32,
    flags: u8,
    default: DefaultValue,
) -> ElementDef {
    ElementDef { name, id, kind, parent, flags, default: Some(default) }
}

use DefaultValue::{Float as DF, Str as DS, Unsigned as DU};
use ElementKind::{Binary, Date, Float, Master, Signed, String as Str, Unsigned};

#[rustfmt::skip]
static DEFINITIONS: &[ElementDef] = &[
    // Global
    def("Void", VOID, Binary, 0, GLOBAL | MULT),
    def("CRC-32", CRC32, Binary, 0, GLOBAL),
    def("SignatureSlot", SIGNATURE_SLOT, Master, 0, GLOBAL | MULT),
    def("SignatureAlgo", 0x7E8A, Unsigned, SIGNATURE_SLOT, 0),
    def("SignatureHash", 0x7E9A, Unsigned, SIGNATURE_SLOT, 0),
    def("SignaturePublicKey", 0x7EA5, Binary, SIGNATURE_SLOT, 0),
    def("Signature", 0x7EB5, Binary, SIGNATURE_SLOT, 0),
    def("SignatureElements", 0x7E5B, Master, SIGNATURE_SLOT, 0),
    def("SignatureElementList", 0x7E7B, Master, 0x7E5B, MULT),
    def("SignedElement", 0x6532, Binary, 0x7E7B, MULT),

    // \EBML
    def("EBML", EBML, Master, 0, MULT),
    defv("EBMLVersion", 0x4286, Unsigned, EBML, 0, DU(1)),
    defv("EBMLReadVersion", 0x42F7, Unsigned, EBML, 0, DU(1)),
    defv("EBMLMaxIDLength", 0x42F2, Unsigned, EBML, 0, DU(4)),
    defv("EBMLMaxSizeLength", 0x42F3, Unsigned, EBML, 0, DU(8)),
    defv("DocType", DOC_TYPE, Str, EBML, 0, DS("matroska")),
    defv("DocTypeVersion", 0x4287, Unsigned, EBML, 0, DU(1)),
    defv("DocTypeReadVersion", 0x4285, Unsigned, EBML, 0, DU(1)),

    // \Segment
    def("Segment", SEGMENT, Master, 0, MULT | UNSIZED),

    // \Segment\SeekHead
    def("SeekHead", SEEK_HEAD, Master, SEGMENT, MULT),
    def("Seek", SEEK, Master, SEEK_HEAD, MULT),
    def("SeekID", SEEK_ID, Binary, SEEK, 0),
    def("SeekPosition", SEEK_POSITION, Unsigned, SEEK, 0),

    // \Segment\Info
    def("Info", INFO, Master, SEGMENT, MULT),
    def("SegmentUID", 0x73A4, Binary, INFO, 0),
    def("SegmentFilename", 0x7384, Str, INFO, 0),
    def("PrevUID", 0x3CB9_23, Binary, INFO, 0),
    def("PrevFilename", 0x3C83_AB, Str, INFO, 0),
    def("NextUID", 0x3EB9_23, Binary, INFO, 0),
    def("NextFilename", 0x3E83_BB, Str, INFO, 0),
    def("SegmentFamily", 0x4444, Binary, INFO, MULT),
    def("ChapterTranslate", 0x6924, Master, INFO, MULT),
    def("ChapterTranslateEditionUID", 0x69FC, Unsigned, 0x6924, MULT),
    def("ChapterTranslateCodec", 0x69BF, Unsigned, 0x6924, 0),
    def("ChapterTranslateID", 0x69A5, Binary, 0x6924, 0),
    defv("TimecodeScale", TIMECODE_SCALE, Unsigned, INFO, 0, DU(1_000_000)),
    def("Duration", DURATION, Float, INFO, 0),
    def("DateUTC", DATE_UTC, Date, INFO, 0),
    def("Title", 0x7BA9, Str, INFO, 0),
    def("MuxingApp", 0x4D80, Str, INFO, 0),
    def("WritingApp", 0x5741, Str, INFO, 0),

    // \Segment\Cluster
    def("Cluster", CLUSTER, Master, SEGMENT, MULT | UNSIZED),
    def("Timecode", TIMECODE, Unsigned, CLUSTER, 0),
    def("SilentTracks", 0x5854, Master, CLUSTER, 0),
    def("SilentTrackNumber", 0x58D7, Unsigned, 0x5854, MULT),
    def("Position", 0xA7, Unsigned, CLUSTER, 0),
    def("PrevSize", 0xAB, Unsigned, CLUSTER, 0),
    def("SimpleBlock", 0xA3, Binary, CLUSTER, MULT),
    def("BlockGroup", BLOCK_GROUP, Master, CLUSTER, MULT),
    def("Block", 0xA1, Binary, BLOCK_GROUP, 0),
    def("BlockAdditions", 0x75A1, Master, BLOCK_GROUP, 0),
    def("BlockMore", 0xA6, Master, 0x75A1, MULT),
    def("BlockAddID", 0xEE, Unsigned, 0xA6, 0),
    def("BlockAdditional", 0xA5, Binary, 0xA6, 0),
    def("BlockDuration", BLOCK_DURATION, Unsigned, BLOCK_GROUP, 0),
    def("ReferencePriority", 0xFA, Unsigned, BLOCK_GROUP, 0),
    def("ReferenceBlock", 0xFB, Signed, BLOCK_GROUP, MULT),
    def("CodecState", 0xA4, Binary, BLOCK_GROUP, 0),
    def("DiscardPadding", 0x75A2, Signed, BLOCK_GROUP, 0),
    def("Slices", 0x8E, Master, BLOCK_GROUP, 0),
    def("TimeSlice", 0xE8, Master, 0x8E, MULT),
    def("LaceNumber", 0xCC, Unsigned, 0xE8, 0),

    // \Segment\Tracks
    def("Tracks", TRACKS, Master, SEGMENT, 0),
    def("TrackEntry", TRACK_ENTRY, Master, TRACKS, MULT),
    def("TrackNumber", 0xD7, Unsigned, TRACK_ENTRY, 0),
    def("TrackUID", 0x73C5, Unsigned, TRACK_ENTRY, 0),
    def("TrackType", TRACK_TYPE, Unsigned, TRACK_ENTRY, 0),
    defv("FlagEnabled", 0xB9, Unsigned, TRACK_ENTRY, 0, DU(1)),
    defv("FlagDefault", 0x88, Unsigned, TRACK_ENTRY, 0, DU(1)),
    defv("FlagForced", 0x55AA, Unsigned, TRACK_ENTRY, 0, DU(0)),
    def("FlagHearingImpaired", 0x55AB, Unsigned, TRACK_ENTRY, 0),
    def("FlagVisualImpaired", 0x55AC, Unsigned, TRACK_ENTRY, 0),
    def("FlagOriginal", 0x55AE, Unsigned, TRACK_ENTRY, 0),
    def("FlagCommentary", 0x55AF, Unsigned, TRACK_ENTRY, 0),
    defv("FlagLacing", 0x9C, Unsigned, TRACK_ENTRY, 0, DU(1)),
    def("MinCache", 0x6DE7, Unsigned, TRACK_ENTRY, 0),
    def("MaxCache", 0x6DF8, Unsigned, TRACK_ENTRY, 0),
    def("DefaultDuration", DEFAULT_DURATION, Unsigned, TRACK_ENTRY, 0),
    def("DefaultDecodedFieldDuration", DEFAULT_DECODED_FIELD_DURATION, Unsigned, TRACK_ENTRY, 0),
    defv("TrackTimecodeScale", 0x2331_4F, Float, TRACK_ENTRY, 0, DF(1.0)),
    def("TrackOffset", 0x537F, Signed, TRACK_ENTRY, 0),
    def("MaxBlockAdditionID", 0x55EE, Unsigned, TRACK_ENTRY, 0),
    def("BlockAdditionMapping", 0x41E4, Master, TRACK_ENTRY, MULT),
    def("BlockAddIDValue", 0x41F0, Unsigned, 0x41E4, 0),
    def("BlockAddIDName", 0x41A4, Str, 0x41E4, 0),
    def("BlockAddIDType", 0x41E7, Unsigned, 0x41E4, 0),
    def("BlockAddIDExtraData", 0x41ED, Binary, 0x41E4, 0),
    def("Name", 0x536E, Str, TRACK_ENTRY, 0),
    defv("Language", 0x22B5_9C, Str, TRACK_ENTRY, 0, DS("eng")),
    def("LanguageIETF", 0x22B5_9D, Str, TRACK_ENTRY, 0),
    def("CodecID", 0x86, Str, TRACK_ENTRY, 0),
    def("CodecPrivate", 0x63A2, Binary, TRACK_ENTRY, 0),
    def("CodecName", 0x2586_88, Str, TRACK_ENTRY, 0),
    def("AttachmentLink", 0x7446, Unsigned, TRACK_ENTRY, 0),
    defv("CodecDecodeAll", 0xAA, Unsigned, TRACK_ENTRY, 0, DU(1)),
    def("TrackOverlay", 0x6FAB, Unsigned, TRACK_ENTRY, MULT),
    def("CodecDelay", 0x56AA, Unsigned, TRACK_ENTRY, 0),
    def("SeekPreRoll", 0x56BB, Unsigned, TRACK_ENTRY, 0),
    def("TrackTranslate", 0x6624, Master, TRACK_ENTRY, MULT),
    def("TrackTranslateEditionUID", 0x66FC, Unsigned, 0x6624, MULT),
    def("TrackTranslateCodec", 0x66BF, Unsigned, 0x6624, 0),
    def("TrackTranslateTrackID", 0x66A5, Binary, 0x6624, 0),

    // \Segment\Tracks\TrackEntry\Video
    def("Video", 0xE0, Master, TRACK_ENTRY, 0),
    def("FlagInterlaced", 0x9A, Unsigned, 0xE0, 0),
    def("FieldOrder", 0x9D, Unsigned, 0xE0, 0),
    def("StereoMode", 0x53B8, Unsigned, 0xE0, 0),
    def("AlphaMode", 0x53C0, Unsigned, 0xE0, 0),
    def("PixelWidth", 0xB0, Unsigned, 0xE0, 0),
    def("PixelHeight", 0xBA, Unsigned, 0xE0, 0),
    def("PixelCropBottom", 0x54AA, Unsigned, 0xE0, 0),
    def("PixelCropTop", 0x54BB, Unsigned, 0xE0, 0),
    def("PixelCropLeft", 0x54CC, Unsigned, 0xE0, 0),
    def("PixelCropRight", 0x54DD, Unsigned, 0xE0, 0),
    def("DisplayWidth", 0x54B0, Unsigned, 0xE0, 0),
    def("DisplayHeight", 0x54BA, Unsigned, 0xE0, 0),
    def("DisplayUnit", 0x54B2, Unsigned, 0xE0, 0),
    def("AspectRatioType", 0x54B3, Unsigned, 0xE0, 0),
    def("ColourSpace", 0x2EB5_24, Binary, 0xE0, 0),
    def("GammaValue", 0x2FB5_23, Float, 0xE0, 0),
    def("FrameRate", 0x2383_E3, Float, 0xE0, 0),
    def("Colour", 0x55B0, Master, 0xE0, 0),
    def("MatrixCoefficients", 0x55B1, Unsigned, 0x55B0, 0),
    def("BitsPerChannel", 0x55B2, Unsigned, 0x55B0, 0),
    def("ChromaSubsamplingHorz", 0x55B3, Unsigned, 0x55B0, 0),
    def("ChromaSubsamplingVert", 0x55B4, Unsigned, 0x55B0, 0),
    def("CbSubsamplingHorz", 0x55B5, Unsigned, 0x55B0, 0),
    def("CbSubsamplingVert", 0x55B6, Unsigned, 0x55B0, 0),
    def("ChromaSitingHorz", 0x55B7, Unsigned, 0x55B0, 0),
    def("ChromaSitingVert", 0x55B8, Unsigned, 0x55B0, 0),
    def("Range", 0x55B9, Unsigned, 0x55B0, 0),
    def("TransferCharacteristics", 0x55BA, Unsigned, 0x55B0, 0),
    def("Primaries", 0x55BB, Unsigned, 0x55B0, 0),
    def("MaxCLL", 0x55BC, Unsigned, 0x55B0, 0),
    def("MaxFALL", 0x55BD, Unsigned, 0x55B0, 0),
    def("MasteringMetadata", 0x55D0, Master, 0x55B0, 0),
    def("PrimaryRChromaticityX", 0x55D1, Float, 0x55D0, 0),
    def("PrimaryRChromaticityY", 0x55D2, Float, 0x55D0, 0),
    def("PrimaryGChromaticityX", 0x55D3, Float, 0x55D0, 0),
    def("PrimaryGChromaticityY", 0x55D4, Float, 0x55D0, 0),
    def("PrimaryBChromaticityX", 0x55D5, Float, 0x55D0, 0),
    def("PrimaryBChromaticityY", 0x55D6, Float, 0x55D0, 0),
    def("WhitePointChromaticityX", 0x55D7, Float, 0x55D0, 0),
    def("WhitePointChromaticityY", 0x55D8, Float, 0x55D0, 0),
    def("LuminanceMax", 0x55D9, Float, 0x55D0, 0),
    def("LuminanceMin", 0x55DA, Float, 0x55D0, 0),
    def("Projection", 0x7670, Master, 0xE0, 0),
    def("ProjectionType", 0x7671, Unsigned, 0x7670, 0),
    def("ProjectionPrivate", 0x7672, Binary, 0x7670, 0),
    def("ProjectionPoseYaw", 0x7673, Float, 0x7670, 0),
    def("ProjectionPosePitch", 0x7674, Float, 0x7670, 0),
    def("ProjectionPoseRoll", 0x7675, Float, 0x7670, 0),

    // \Segment\Tracks\TrackEntry\Audio
    def("Audio", 0xE1, Master, TRACK_ENTRY, 0),
    defv("SamplingFrequency", 0xB5, Float, 0xE1, 0, DF(8000.0)),
    def("OutputSamplingFrequency", 0x78B5, Float, 0xE1, 0),
    defv("Channels", 0x9F, Unsigned, 0xE1, 0, DU(1)),
    def("ChannelPositions", 0x7D7B, Binary, 0xE1, 0),
    def("BitDepth", 0x6264, Unsigned, 0xE1, 0),

    // \Segment\Tracks\TrackEntry\TrackOperation
    def("TrackOperation", 0xE2, Master, TRACK_ENTRY, 0),
    def("TrackCombinePlanes", 0xE3, Master, 0xE2, 0),
    def("TrackPlane", 0xE4, Master, 0xE3, MULT),
    def("TrackPlaneUID", 0xE5, Unsigned, 0xE4, 0),
    def("TrackPlaneType", 0xE6, Unsigned, 0xE4, 0),
    def("TrackJoinBlocks", 0xE9, Master, 0xE2, 0),
    def("TrackJoinUID", 0xED, Unsigned, 0xE9, MULT),

    // \Segment\Tracks\TrackEntry\ContentEncodings
    def("ContentEncodings", 0x6D80, Master, TRACK_ENTRY, 0),
    def("ContentEncoding", 0x6240, Master, 0x6D80, MULT),
    def("ContentEncodingOrder", 0x5031, Unsigned, 0x6240, 0),
    defv("ContentEncodingScope", 0x5032, Unsigned, 0x6240, 0, DU(1)),
    def("ContentEncodingType", 0x5033, Unsigned, 0x6240, 0),
    def("ContentCompression", 0x5034, Master, 0x6240, 0),
    def("ContentCompAlgo", 0x4254, Unsigned, 0x5034, 0),
    def("ContentCompSettings", 0x4255, Binary, 0x5034, 0),
    def("ContentEncryption", 0x5035, Master, 0x6240, 0),
    def("ContentEncAlgo", 0x47E1, Unsigned, 0x5035, 0),
    def("ContentEncKeyID", 0x47E2, Binary, 0x5035, 0),
    def("ContentEncAESSettings", 0x47E7, Master, 0x5035, 0),
    def("AESSettingsCipherMode", 0x47E8, Unsigned, 0x47E7, 0),

    // \Segment\Cues
    def("Cues", CUES, Master, SEGMENT, 0),
    def("CuePoint", CUE_POINT, Master, CUES, MULT),
    def("CueTime", CUE_TIME, Unsigned, CUE_POINT, 0),
    def("CueTrackPositions", CUE_TRACK_POSITIONS, Master, CUE_POINT, MULT),
    def("CueTrack", 0xF7, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueClusterPosition", 0xF1, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueRelativePosition", 0xF0, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueDuration", CUE_DURATION, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueBlockNumber", 0x5378, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueCodecState", 0xEA, Unsigned, CUE_TRACK_POSITIONS, 0),
    def("CueReference", 0xDB, Master, CUE_TRACK_POSITIONS, MULT),
    def("CueRefTime", 0x96, Unsigned, 0xDB, 0),

    // \Segment\Attachments
    def("Attachments", ATTACHMENTS, Master, SEGMENT, 0),
    def("AttachedFile", ATTACHED_FILE, Master, ATTACHMENTS, MULT),
    def("FileDescription", 0x467E, Str, ATTACHED_FILE, 0),
    def("FileName", FILE_NAME, Str, ATTACHED_FILE, 0),
    def("FileMimeType", 0x4660, Str, ATTACHED_FILE, 0),
    def("FileData", FILE_DATA, Binary, ATTACHED_FILE, 0),
    def("FileUID", 0x46AE, Unsigned, ATTACHED_FILE, 0),

    // \Segment\Chapters
    def("Chapters", CHAPTERS, Master, SEGMENT, 0),
    def("EditionEntry", EDITION_ENTRY, Master, CHAPTERS, MULT),
    def("EditionUID", 0x45BC, Unsigned, EDITION_ENTRY, 0),
    def("EditionFlagHidden", 0x45BD, Unsigned, EDITION_ENTRY, 0),
    def("EditionFlagDefault", 0x45DB, Unsigned, EDITION_ENTRY, 0),
    def("EditionFlagOrdered", 0x45DD, Unsigned, EDITION_ENTRY, 0),
    def("ChapterAtom", CHAPTER_ATOM, Master, EDITION_ENTRY, MULT | RECURSE),
    def("ChapterUID", 0x73C4, Unsigned, CHAPTER_ATOM, 0),
    def("ChapterStringUID", 0x5654, Str, CHAPTER_ATOM, 0),
    def("ChapterTimeStart", CHAPTER_TIME_START, Unsigned, CHAPTER_ATOM, 0),
    def("ChapterTimeEnd", CHAPTER_TIME_END, Unsigned, CHAPTER_ATOM, 0),
    def("ChapterFlagHidden", 0x98, Unsigned, CHAPTER_ATOM, 0),
    defv("ChapterFlagEnabled", 0x4598, Unsigned, CHAPTER_ATOM, 0, DU(1)),
    def("ChapterSegmentUID", 0x6E67, Binary, CHAPTER_ATOM, 0),
    def("ChapterSegmentEditionUID", 0x6EBC, Unsigned, CHAPTER_ATOM, 0),
    def("ChapterPhysicalEquiv", 0x63C3, Unsigned, CHAPTER_ATOM, 0),
    def("ChapterTrack", 0x8F, Master, CHAPTER_ATOM, 0),
    def("ChapterTrackUID", 0x89, Unsigned, 0x8F, MULT),
    def("ChapterDisplay", 0x80, Master, CHAPTER_ATOM, MULT),
    def("ChapString", 0x85, Str, 0x80, 0),
    defv("ChapLanguage", 0x437C, Str, 0x80, MULT, DS("eng")),
    def("ChapLanguageIETF", 0x437D, Str, 0x80, MULT),
    def("ChapCountry", 0x437E, Str, 0x80, MULT),
    def("ChapProcess", 0x6944, Master, CHAPTER_ATOM, MULT),
    def("ChapProcessCodecID", 0x6955, Unsigned, 0x6944, 0),
    def("ChapProcessPrivate", 0x450D, Binary, 0x6944, 0),
    def("ChapProcessCommand", 0x6911, Master, 0x6944, MULT),
    def("ChapProcessTime", 0x6922, Unsigned, 0x6911, 0),
    def("ChapProcessData", 0x6933, Binary, 0x6911, 0),

    // \Segment\Tags
    def("Tags", TAGS, Master, SEGMENT, MULT),
    def("Tag", TAG, Master, TAGS, MULT),
    def("Targets", 0x63C0, Master, TAG, 0),
    defv("TargetTypeValue", 0x68CA, Unsigned, 0x63C0, 0, DU(50)),
    def("TargetType", 0x63CA, Str, 0x63C0, 0),
    def("TagTrackUID", 0x63C5, Unsigned, 0x63C0, MULT),
    def("TagEditionUID", 0x63C9, Unsigned, 0x63C0, MULT),
    def("TagChapterUID", 0x63C4, Unsigned, 0x63C0, MULT),
    def("TagAttachmentUID", 0x63C6, Unsigned, 0x63C0, MULT),
    def("SimpleTag", SIMPLE_TAG, Master, TAG, MULT | RECURSE),
    def("TagName", 0x45A3, Str, SIMPLE_TAG, 0),
    defv("TagLanguage", 0x447A, Str, SIMPLE_TAG, 0, DS("und")),
    def("TagLanguageIETF", 0x447B, Str, SIMPLE_TAG, 0),
    defv("TagDefault", 0x4484, Unsigned, SIMPLE_TAG, 0, DU(1)),
    def("TagString", 0x4487, Str, SIMPLE_TAG, 0),
    def("TagBinary", 0x4485, Binary, SIMPLE_TAG, 0),
];

fn index() -> &'static HashMap<u32, &'static ElementDef> {
    static INDEX: OnceLock<HashMap<u32, &'static ElementDef>> = OnceLock::new();
    INDEX.get_or_init(|| DEFINITIONS.iter().map(|def| (def.id, def)).collect())
}

/// Look an element up by ID alone, ignoring its position in the tree.
pub fn lookup(id: u32) -> Option<&'static ElementDef> {
    index().get(&id).copied()
}

/// Resolve a child ID against its container.
///
/// An ID is legal under `parent_id` when its schema entry declares that
/// parent, when it is global, or when the container nests itself and the
/// child is of the container's own type. Anything else is unknown to the
/// container and stored as an opaque element.
pub fn child_def(parent_id: u32, id: u32) -> Option<&'static ElementDef> {
    let def = lookup(id)?;
    if def.parent == parent_id || def.is_global() || (def.is_recursive() && id == parent_id) {
        Some(def)
    } else {
        None
    }
}

/// Map a TrackType code to its symbolic name.
pub fn track_type_name(code: u64) -> Option<&'static str> {
    match code {
        0x01 => Some("Video"),
        0x02 => Some("Audio"),
        0x10 => Some("Logo"),
        0x11 => Some("Subtitle"),
        0x12 => Some("Buttons"),
        0x20 => Some("Control"),
        _ => None,
    }
}
