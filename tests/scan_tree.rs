//! End-to-end scans over synthetic in-memory Matroska streams.

use mkvscope::{
    ebml, CallbackAction, MkvScanner, RawValue, ScanOptions, Sections, TimeSpan, Value,
};
use std::io::Cursor;

// ---------------------------------------------------------------------------
// Byte-stream builder
// ---------------------------------------------------------------------------

const EBML_ID: u32 = 0x1A45_DFA3;
const SEGMENT: u32 = 0x1853_8067;
const SEEK_HEAD: u32 = 0x114D_9B74;
const SEEK: u32 = 0x4DBB;
const SEEK_ID: u32 = 0x53AB;
const SEEK_POSITION: u32 = 0x53AC;
const INFO: u32 = 0x1549_A966;
const TIMECODE_SCALE: u32 = 0x2AD7_B1;
const DURATION: u32 = 0x4489;
const DATE_UTC: u32 = 0x4461;
const CLUSTER: u32 = 0x1F43_B675;
const TIMECODE: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;
const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_TYPE: u32 = 0x83;
const DEFAULT_DURATION: u32 = 0x23E3_83;
const LANGUAGE: u32 = 0x22B5_9C;
const CUES: u32 = 0x1C53_BB6B;
const CUE_POINT: u32 = 0xBB;
const CUE_TIME: u32 = 0xB3;
const CHAPTERS: u32 = 0x1043_A770;
const EDITION_ENTRY: u32 = 0x45B9;
const CHAPTER_ATOM: u32 = 0xB6;
const CHAPTER_TIME_START: u32 = 0x91;
const ATTACHMENTS: u32 = 0x1941_A469;
const ATTACHED_FILE: u32 = 0x61A7;
const FILE_NAME: u32 = 0x466E;
const FILE_DATA: u32 = 0x465C;
const TAGS: u32 = 0x1254_C367;
const TAG: u32 = 0x7373;
const SIMPLE_TAG: u32 = 0x67C8;
const TAG_NAME: u32 = 0x45A3;
const TAG_STRING: u32 = 0x4487;

fn id_bytes(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    bytes[skip..].to_vec()
}

fn el(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    let (size, n) = ebml::encode_vint(payload.len() as u64);
    out.extend_from_slice(&size[..n]);
    out.extend_from_slice(payload);
    out
}

fn master(id: u32, children: &[Vec<u8>]) -> Vec<u8> {
    el(id, &children.concat())
}

fn uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    el(id, &bytes[skip..])
}

/// Unsigned payload padded to eight octets, for predictable sizes.
fn uint_fixed(id: u32, value: u64) -> Vec<u8> {
    el(id, &value.to_be_bytes())
}

fn float32(id: u32, value: f32) -> Vec<u8> {
    el(id, &value.to_be_bytes())
}

fn string(id: u32, value: &str) -> Vec<u8> {
    el(id, value.as_bytes())
}

fn ebml_header() -> Vec<u8> {
    master(
        EBML_ID,
        &[
            uint(0x4286, 1),
            uint(0x42F7, 1),
            uint(0x42F2, 4),
            uint(0x42F3, 8),
            string(0x4282, "matroska"),
            uint(0x4287, 4),
            uint(0x4285, 2),
        ],
    )
}

fn file_with_segment(children: &[Vec<u8>]) -> Vec<u8> {
    let mut data = ebml_header();
    data.extend_from_slice(&master(SEGMENT, children));
    data
}

fn scan(data: Vec<u8>, options: ScanOptions) -> mkvscope::Document {
    MkvScanner::with_options(Cursor::new(data), options)
        .unwrap()
        .read_document()
        .unwrap()
}

fn tags_section(name: &str, value: &str) -> Vec<u8> {
    master(
        TAGS,
        &[master(TAG, &[master(SIMPLE_TAG, &[string(TAG_NAME, name), string(TAG_STRING, value)])])],
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn duration_only_fast_path() {
    let data = file_with_segment(&[master(
        INFO,
        &[uint(TIMECODE_SCALE, 1_000_000), float32(DURATION, 123_456.0)],
    )]);
    let doc = scan(data, ScanOptions::new().sections(Sections::INFO).binary_size_limit(Some(0)));

    let seg = doc.segment_ids()[0];
    let duration = doc.descend(seg, "Info/Duration").unwrap();
    assert_eq!(duration.value.as_span(), Some(TimeSpan::from_nanos(123_456_000_000)));
    assert_eq!(duration.raw, Some(RawValue::Float(123_456.0)));
    assert_eq!(duration.display.as_deref(), Some("123.456 s"));
    assert_eq!(duration.path, "/Segment/Info/Duration");
}

#[test]
fn duration_recooked_when_scale_arrives_late() {
    // EBML ordering permits Duration before TimecodeScale.
    let data = file_with_segment(&[master(
        INFO,
        &[float32(DURATION, 1000.0), uint(TIMECODE_SCALE, 2_000_000)],
    )]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let duration = doc.descend(seg, "Info/Duration").unwrap();
    assert_eq!(duration.value.as_span(), Some(TimeSpan::from_nanos(2_000_000_000)));
    // The raw value is set once and survives the re-cook.
    assert_eq!(duration.raw, Some(RawValue::Float(1000.0)));
}

#[test]
fn track_type_indexing() {
    let data = file_with_segment(&[master(
        TRACKS,
        &[
            master(TRACK_ENTRY, &[uint(TRACK_NUMBER, 1), uint(TRACK_TYPE, 1)]),
            master(TRACK_ENTRY, &[uint(TRACK_NUMBER, 2), uint(TRACK_TYPE, 2)]),
        ],
    )]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let tracks = doc.child_id(seg, "Tracks").unwrap();

    let entries = doc.children_named(tracks, "TrackEntry");
    assert_eq!(entries.len(), 2);
    assert!(doc.get(tracks).children().unwrap().is_list("TrackEntry"));

    let video = doc.children_named(tracks, "Video");
    let audio = doc.children_named(tracks, "Audio");
    assert_eq!(video.len(), 1);
    assert_eq!(audio.len(), 1);
    // The indexed nodes are the TrackEntry containers themselves.
    assert_eq!(video[0].pos, entries[0].pos);
    assert_eq!(audio[0].pos, entries[1].pos);

    let track_type = doc.descend(seg, "Tracks/TrackEntry/TrackType").unwrap();
    assert_eq!(track_type.value.as_str(), Some("Video"));
    assert_eq!(track_type.raw, Some(RawValue::Unsigned(1)));
}

#[test]
fn tail_scan_locates_trailing_tags() {
    // No SeekHead; Clusters and Cues sit between Info and the trailing
    // Tags. The scan must read Info, skip the rest, and land on Tags.
    let cluster = master(CLUSTER, &[uint(TIMECODE, 0), el(SIMPLE_BLOCK, &vec![0u8; 4000])]);
    let cues = master(CUES, &[master(CUE_POINT, &[uint(CUE_TIME, 0)])]);
    let data = file_with_segment(&[
        master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)]),
        cluster.clone(),
        cluster,
        cues,
        tags_section("TITLE", "tail scan"),
    ]);
    let doc = scan(data, ScanOptions::new().sections(Sections::INFO | Sections::TAGS));

    let seg = doc.segment_ids()[0];
    let tag_name = doc.descend(seg, "Tags/Tag/SimpleTag/TagName").unwrap();
    assert_eq!(tag_name.value.as_str(), Some("TITLE"));

    // The first Cluster was stubbed when it triggered the skip; the scan
    // then jumped straight to Tags, so Cues never entered the tree.
    let clusters = doc.children_named(seg, "Cluster");
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].skipped);
    assert!(doc.child(seg, "Cues").is_none());
    assert!(doc.find("SimpleBlock").is_empty());
}

#[test]
fn seek_head_redirect_skips_clusters() {
    let info = master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)]);
    let cluster = master(CLUSTER, &[uint(TIMECODE, 0), el(SIMPLE_BLOCK, &vec![0u8; 2000])]);
    let tags = tags_section("ARTIST", "redirect");

    let seek_head = |info_off: u64, tags_off: u64| {
        master(
            SEEK_HEAD,
            &[
                master(
                    SEEK,
                    &[el(SEEK_ID, &INFO.to_be_bytes()), uint_fixed(SEEK_POSITION, info_off)],
                ),
                master(
                    SEEK,
                    &[el(SEEK_ID, &TAGS.to_be_bytes()), uint_fixed(SEEK_POSITION, tags_off)],
                ),
            ],
        )
    };

    // Offsets are relative to the Segment payload start; the fixed-width
    // SeekPosition keeps the SeekHead length independent of the values.
    let head_len = seek_head(0, 0).len() as u64;
    let info_off = head_len;
    let tags_off = info_off + info.len() as u64 + 2 * cluster.len() as u64;

    let data = file_with_segment(&[
        seek_head(info_off, tags_off),
        info,
        cluster.clone(),
        cluster,
        tags,
    ]);
    let doc = scan(data, ScanOptions::new().sections(Sections::INFO | Sections::TAGS));

    let seg = doc.segment_ids()[0];
    assert!(doc.descend(seg, "Info/TimecodeScale").is_some());
    let tag = doc.descend(seg, "Tags/Tag/SimpleTag/TagString").unwrap();
    assert_eq!(tag.value.as_str(), Some("redirect"));

    // The redirect jumps over the second Cluster entirely.
    assert_eq!(doc.children_named(seg, "Cluster").len(), 1);
    assert!(doc.find("SimpleBlock").is_empty());
}

#[test]
fn attachment_payloads_reread_in_full() {
    let payload: Vec<u8> = (0..64u8).collect();
    let data = file_with_segment(&[master(
        ATTACHMENTS,
        &[master(ATTACHED_FILE, &[string(FILE_NAME, "cover.png"), el(FILE_DATA, &payload)])],
    )]);

    let mut scanner = MkvScanner::with_options(Cursor::new(data), ScanOptions::new()).unwrap();
    let doc = scanner.read_document().unwrap();

    let seg = doc.segment_ids()[0];
    let file_data = doc.descend(seg, "Attachments/AttachedFile/FileData").unwrap();
    assert!(file_data.skipped);
    assert_eq!(file_data.size, 64);
    assert_eq!(file_data.value.as_bytes().map(<[u8]>::len), Some(16));

    // The extraction protocol: seek to datapos, read size bytes.
    let full = scanner.read_payload(file_data).unwrap();
    assert_eq!(full, payload);
}

#[test]
fn recursive_chapter_atoms() {
    let inner = master(CHAPTER_ATOM, &[uint(CHAPTER_TIME_START, 1_000_000_000)]);
    let outer = master(CHAPTER_ATOM, &[uint(CHAPTER_TIME_START, 0), inner]);
    let data = file_with_segment(&[master(CHAPTERS, &[master(EDITION_ENTRY, &[outer])])]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let inner = doc.descend(seg, "Chapters/EditionEntry/ChapterAtom/ChapterAtom").unwrap();
    assert_eq!(inner.path, "/Segment/Chapters/EditionEntry/ChapterAtom/ChapterAtom/");
    assert!(inner.level >= 3);

    let start = doc.descend(seg, "Chapters/EditionEntry/ChapterAtom/ChapterAtom/ChapterTimeStart");
    // Chapter times are nanoseconds directly, not timecode-scaled.
    assert_eq!(start.unwrap().value.as_span(), Some(TimeSpan::from_nanos(1_000_000_000)));
}

#[test]
fn default_duration_derives_fps_after_track_type() {
    // DefaultDuration decoded before TrackType: the fps display appears
    // once the dependency arrives.
    let data = file_with_segment(&[master(
        TRACKS,
        &[master(TRACK_ENTRY, &[uint(DEFAULT_DURATION, 40_000_000), uint(TRACK_TYPE, 1)])],
    )]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let duration = doc.descend(seg, "Tracks/TrackEntry/DefaultDuration").unwrap();
    assert_eq!(duration.value.as_span(), Some(TimeSpan::from_nanos(40_000_000)));
    assert_eq!(duration.raw, Some(RawValue::Unsigned(40_000_000)));
    assert_eq!(duration.display.as_deref(), Some("40 ms (25.000 fps)"));
}

#[test]
fn cluster_times_scale_when_clusters_requested() {
    let data = file_with_segment(&[
        master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)]),
        master(CLUSTER, &[uint(TIMECODE, 5000)]),
    ]);
    let doc = scan(data, ScanOptions::everything());

    let seg = doc.segment_ids()[0];
    let timecode = doc.descend(seg, "Cluster/Timecode").unwrap();
    assert_eq!(timecode.value.as_span(), Some(TimeSpan::from_nanos(5_000_000_000)));
    assert_eq!(timecode.raw, Some(RawValue::Unsigned(5000)));
}

#[test]
fn eighty_bit_duration_floats() {
    // 123456.0 in x87 extended precision: exponent 2^16, significand with
    // the explicit integer bit.
    let mut payload = [0u8; 10];
    payload[..2].copy_from_slice(&(16383u16 + 16).to_be_bytes());
    payload[2..].copy_from_slice(&(123_456u64 << 47).to_be_bytes());

    let data = file_with_segment(&[master(
        INFO,
        &[uint(TIMECODE_SCALE, 1_000_000), el(DURATION, &payload)],
    )]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let duration = doc.descend(seg, "Info/Duration").unwrap();
    assert_eq!(duration.raw, Some(RawValue::Float(123_456.0)));
    assert_eq!(duration.value.as_span(), Some(TimeSpan::from_nanos(123_456_000_000)));
}

#[test]
fn date_decodes_to_wall_clock() {
    let data = file_with_segment(&[master(INFO, &[el(DATE_UTC, &0i64.to_be_bytes())])]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let date = doc.descend(seg, "Info/DateUTC").unwrap();
    match &date.value {
        Value::Date(d) => assert_eq!(d.to_rfc3339(), "2001-01-01T00:00:00+00:00"),
        other => panic!("expected a date, got {other:?}"),
    }
}

#[test]
fn zero_sized_elements_take_schema_defaults() {
    let data = file_with_segment(&[
        master(INFO, &[el(TIMECODE_SCALE, &[])]),
        master(TRACKS, &[master(TRACK_ENTRY, &[uint(TRACK_TYPE, 0x11), el(LANGUAGE, &[])])]),
    ]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    let scale = doc.descend(seg, "Info/TimecodeScale").unwrap();
    assert_eq!(scale.value.as_unsigned(), Some(1_000_000));

    let language = doc.descend(seg, "Tracks/TrackEntry/Language").unwrap();
    assert_eq!(language.value.as_str(), Some("eng"));

    let subtitle = doc.children_named(doc.child_id(seg, "Tracks").unwrap(), "Subtitle");
    assert_eq!(subtitle.len(), 1);
}

#[test]
fn unknown_elements_keep_a_printable_preview() {
    let data = file_with_segment(&[master(
        INFO,
        &[el(0x7FFE, b"hello world!"), uint(TIMECODE_SCALE, 1_000_000)],
    )]);
    let doc = scan(data, ScanOptions::new());

    let unknown = doc.find("?");
    assert_eq!(unknown.len(), 1);
    let unknown = doc.get(unknown[0]);
    assert!(unknown.skipped);
    assert_eq!(unknown.display.as_deref(), Some("hello world!"));

    // The unknown element did not derail its siblings.
    let seg = doc.segment_ids()[0];
    assert!(doc.descend(seg, "Info/TimecodeScale").is_some());
}

#[test]
fn leading_garbage_resynchronizes() {
    let mut data = b"not ebml at all\x00\x00".to_vec();
    data.extend_from_slice(&file_with_segment(&[master(
        INFO,
        &[uint(TIMECODE_SCALE, 1_000_000)],
    )]));
    let doc = scan(data, ScanOptions::new());
    assert_eq!(doc.segment_ids().len(), 1);
    assert_eq!(doc.doc_type(), Some("matroska"));
}

#[test]
fn unrecognizable_stream_is_rejected() {
    let data: Vec<u8> = (0u8..200).map(|b| b.wrapping_mul(7) | 0x20).collect();
    let err = MkvScanner::new(Cursor::new(data)).unwrap().read_document().unwrap_err();
    assert!(matches!(err, mkvscope::MkvError::NotAMatroskaFile));
}

#[test]
fn concatenated_segments() {
    let mut data = file_with_segment(&[master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)])]);
    data.extend_from_slice(&file_with_segment(&[master(INFO, &[string(0x7BA9, "second")])]));
    let doc = scan(data, ScanOptions::new());

    assert_eq!(doc.segment_ids().len(), 2);
    assert_eq!(doc.ebml_headers().count(), 2);
    let second = doc.segment_ids()[1];
    assert_eq!(doc.descend(second, "Info/Title").unwrap().value.as_str(), Some("second"));
}

#[test]
fn unknown_size_segment_resolves_extent() {
    let mut data = ebml_header();
    let info = master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)]);
    data.extend_from_slice(&id_bytes(SEGMENT));
    data.push(0xFF); // unknown size
    data.extend_from_slice(&info);

    let doc = scan(data, ScanOptions::new());
    let seg = doc.segment_ids()[0];
    assert_eq!(doc.get(seg).size, info.len() as u64);
    assert!(doc.descend(seg, "Info/TimecodeScale").is_some());
}

#[test]
fn callback_stop_returns_partial_tree() {
    let data = file_with_segment(&[
        master(INFO, &[uint(TIMECODE_SCALE, 1_000_000)]),
        master(TRACKS, &[master(TRACK_ENTRY, &[uint(TRACK_TYPE, 1)])]),
    ]);

    let mut scanner = MkvScanner::with_options(Cursor::new(data), ScanOptions::new()).unwrap();
    let doc = scanner
        .read_document_with(|el| {
            if el.name == "Tracks" {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        })
        .unwrap();

    let seg = doc.segment_ids()[0];
    assert!(doc.descend(seg, "Info/TimecodeScale").is_some());
    // The Tracks container was recorded, but the stop prevented descent.
    let tracks = doc.child(seg, "Tracks").unwrap();
    assert_eq!(tracks.children().map(|c| c.len()), Some(0));
    assert!(doc.find("TrackEntry").is_empty());
}

#[test]
fn corrupt_container_does_not_poison_siblings() {
    // An Info payload that decays into garbage after a valid child: the
    // container is abandoned at the bad byte, the rest of the Segment
    // parses.
    let mut info_payload = uint(TIMECODE_SCALE, 1_000_000);
    info_payload.extend_from_slice(&[0x00, 0x00, 0x00]);
    let data = file_with_segment(&[
        el(INFO, &info_payload),
        master(TRACKS, &[master(TRACK_ENTRY, &[uint(TRACK_TYPE, 2)])]),
    ]);
    let doc = scan(data, ScanOptions::new());

    let seg = doc.segment_ids()[0];
    assert!(doc.descend(seg, "Info/TimecodeScale").is_some());
    assert_eq!(doc.find("TrackEntry").len(), 1);
}

#[test]
fn tree_invariants_hold() {
    let data = file_with_segment(&[
        master(INFO, &[uint(TIMECODE_SCALE, 1_000_000), float32(DURATION, 10.0)]),
        master(
            TRACKS,
            &[master(TRACK_ENTRY, &[uint(TRACK_NUMBER, 1), uint(TRACK_TYPE, 1)])],
        ),
        master(CHAPTERS, &[master(EDITION_ENTRY, &[master(CHAPTER_ATOM, &[uint(CHAPTER_TIME_START, 0)])])]),
        tags_section("TITLE", "invariants"),
    ]);
    let doc = scan(data, ScanOptions::new().include(Sections::TAGS));

    for node in doc.find_by(|_| true) {
        let el = doc.get(node);
        assert!(el.pos < el.datapos, "{}: header before payload", el.path);

        if let Some(parent) = el.parent {
            let parent = doc.get(parent);
            assert!(
                el.datapos + el.size <= parent.datapos + parent.size,
                "{}: child exceeds parent extent",
                el.path
            );
            assert_eq!(el.level, parent.level + 1, "{}", el.path);
            assert!(el.path.starts_with(&parent.path), "{}", el.path);
        } else {
            assert_eq!(el.level, 0, "{}", el.path);
        }

        // Trailing slash iff container.
        assert_eq!(el.path.ends_with('/'), el.is_master(), "{}", el.path);
    }
}
