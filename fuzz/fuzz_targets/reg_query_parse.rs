//! Fuzz harness for the `reg query` output parser and the value codec.
//!
//! `reg.exe` output reaches the parser unsanitized, and registry payloads
//! reach the codec with arbitrary type tags and widths; neither is allowed
//! to panic on malformed input.

#![no_main]
use libfuzzer_sys::fuzz_target;
use qosadm_core::registry::codec::{decode_to_string, RawValueKind};
use qosadm_core::registry::regtool::parse_reg_query;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_reg_query(text);
    }
    for kind in [
        RawValueKind::Sz,
        RawValueKind::ExpandSz,
        RawValueKind::MultiSz,
        RawValueKind::Dword,
        RawValueKind::Qword,
        RawValueKind::Binary,
        RawValueKind::Other,
    ] {
        let _ = decode_to_string(kind, data);
    }
});
