//! Registry value codec.
//!
//! The QoS policy schema stores every field as `REG_SZ`, but values read
//! back from an arbitrary registry may carry any type tag. Decoding never
//! fails: whatever cannot be reduced to a string becomes the empty string,
//! which downstream code treats the same as an absent value. Encoding is the
//! identity after string coercion — writes always produce `REG_SZ` bytes.

/// Registry value type, reduced to the cases the decoder distinguishes.
///
/// The native backend maps `winreg`'s type tags onto this; tests feed it
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValueKind {
    /// `REG_SZ`.
    Sz,
    /// `REG_EXPAND_SZ`.
    ExpandSz,
    /// `REG_MULTI_SZ`.
    MultiSz,
    /// `REG_DWORD` (little-endian).
    Dword,
    /// `REG_QWORD` (little-endian).
    Qword,
    /// `REG_BINARY`.
    Binary,
    /// Anything else, including `REG_NONE`.
    Other,
}

/// Decode a raw registry value into the canonical string representation.
///
/// String-family and binary payloads are interpreted as UTF-16LE with
/// trailing NULs trimmed; DWORD/QWORD payloads render as decimal strings.
/// Malformed payloads (wrong width, undecodable) yield `""` — this function
/// never panics and never errors.
#[must_use]
pub fn decode_to_string(kind: RawValueKind, data: &[u8]) -> String {
    match kind {
        RawValueKind::Sz | RawValueKind::ExpandSz | RawValueKind::MultiSz
        | RawValueKind::Binary => utf16le_nul_trimmed(data),
        RawValueKind::Dword => match <[u8; 4]>::try_from(data) {
            Ok(bytes) => u32::from_le_bytes(bytes).to_string(),
            Err(_) => String::new(),
        },
        RawValueKind::Qword => match <[u8; 8]>::try_from(data) {
            Ok(bytes) => u64::from_le_bytes(bytes).to_string(),
            Err(_) => String::new(),
        },
        RawValueKind::Other => String::new(),
    }
}

/// Encode a string as `REG_SZ` bytes: UTF-16LE code units plus the
/// terminating NUL pair.
#[must_use]
pub fn encode_sz_bytes(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((value.len() + 1) * 2);
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

/// Decode UTF-16LE bytes, dropping a trailing odd byte and trimming
/// trailing NULs.
fn utf16le_nul_trimmed(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let decoded = String::from_utf16_lossy(&units);
    decoded.trim_end_matches('\0').to_string()
}
