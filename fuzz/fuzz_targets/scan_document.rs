#![no_main]

//! Fuzz target for Matroska tree scanning.
//!
//! Exercises the VINT decoders, the 80-bit float path, and the full
//! document scan (including tail scans and SeekHead redirects) with
//! arbitrary input to find parsing bugs and panics.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mkvscope::{MkvScanner, ScanOptions, Sections};
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct ScanInput {
    data: Vec<u8>,
    operation: ScanOperation,
}

#[derive(Arbitrary, Debug)]
enum ScanOperation {
    /// Parse a length-form VINT.
    ReadVint,
    /// Parse an ID-form VINT.
    ReadElementId,
    /// Parse an element size with the unknown-size sentinel.
    ReadElementSize,
    /// Decode an 80-bit extended-precision float.
    ReadExtendedFloat,
    /// Round-trip encode/decode a VINT.
    VintRoundtrip { value: u64 },
    /// Scan a full document with the common sections.
    ScanCommon,
    /// Scan a full document reading everything, Clusters included.
    ScanEverything { exhaustive: bool },
}

fuzz_target!(|input: ScanInput| {
    // Bound the allocation a hostile size field can cause.
    if input.data.len() > 64 * 1024 {
        return;
    }

    match input.operation {
        ScanOperation::ReadVint => {
            // Should not panic on any input.
            let _ = mkvscope::ebml::read_vint(&mut Cursor::new(&input.data), 0);
        }

        ScanOperation::ReadElementId => {
            let _ = mkvscope::ebml::read_element_id(&mut Cursor::new(&input.data), 0);
        }

        ScanOperation::ReadElementSize => {
            let _ = mkvscope::ebml::read_element_size(&mut Cursor::new(&input.data), 0);
        }

        ScanOperation::ReadExtendedFloat => {
            if input.data.len() >= 10 {
                let mut raw = [0u8; 10];
                raw.copy_from_slice(&input.data[..10]);
                let _ = mkvscope::ebml::read_float_extended(&raw);
            }
        }

        ScanOperation::VintRoundtrip { value } => {
            // Limit to the representable width (8 octets, 56 data bits).
            let value = value & 0x00FF_FFFF_FFFF_FFFF;
            let (encoded, len) = mkvscope::ebml::encode_vint(value);
            if let Ok((decoded, decoded_len)) =
                mkvscope::ebml::read_vint(&mut Cursor::new(&encoded[..len]), 0)
            {
                assert_eq!(value, decoded, "VINT round-trip mismatch");
                assert_eq!(len, decoded_len);
            }
        }

        ScanOperation::ScanCommon => {
            if let Ok(mut scanner) = MkvScanner::new(Cursor::new(input.data)) {
                // Errors are fine; panics are not.
                let _ = scanner.read_document();
            }
        }

        ScanOperation::ScanEverything { exhaustive } => {
            let options = ScanOptions::everything()
                .sections(Sections::ALL)
                .exhaustive_search(exhaustive);
            if let Ok(mut scanner) = MkvScanner::with_options(Cursor::new(input.data), options) {
                let _ = scanner.read_document();
            }
        }
    }
});
