//! Decoding of child process output.
//!
//! Console programs on Windows write in the OEM code page of the host, not
//! UTF-8. Code pages are mapped onto `encoding_rs` encodings by number.

use encoding_rs::Encoding;

use crate::error::{DesignerError, Result};

/// Windows code page identifier for UTF-8.
pub const UTF8_CODE_PAGE: u32 = 65001;

/// Map a Windows code page number to an encoding, if `encoding_rs` knows it.
pub fn encoding_for_code_page(code_page: u32) -> Option<&'static Encoding> {
    match code_page {
        UTF8_CODE_PAGE => Some(encoding_rs::UTF_8),
        866 => Some(encoding_rs::IBM866),
        _ => Encoding::for_label(format!("cp{}", code_page).as_bytes())
            .or_else(|| Encoding::for_label(format!("windows-{}", code_page).as_bytes())),
    }
}

/// Look up an encoding by label (`"cp866"`, `"utf-8"`) or bare code page number (`"1251"`).
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    if let Ok(code_page) = label.parse::<u32>() {
        return encoding_for_code_page(code_page);
    }
    Encoding::for_label(label.as_bytes())
}

/// Encoding of the host console.
///
/// Windows only: the OEM code page. Unknown code pages fall back to UTF-8
/// with a warning. Other hosts fail with `UnsupportedPlatform`.
pub fn host_encoding() -> Result<&'static Encoding> {
    let code_page = crate::exec::console::oem_code_page()?;
    Ok(encoding_for_code_page(code_page).unwrap_or_else(|| {
        tracing::warn!(
            code_page = code_page,
            "no decoder for console code page, decoding output as UTF-8"
        );
        encoding_rs::UTF_8
    }))
}

/// Decode raw process output, replacing malformed sequences.
pub fn decode(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = actual.name(), "malformed bytes in process output");
    }
    text.into_owned()
}

/// Decode as strict UTF-8 (a leading BOM is dropped), or with `fallback`
/// when the bytes are not valid UTF-8.
pub fn decode_utf8_or(fallback: &'static Encoding, bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => fallback.decode_without_bom_handling(bytes).0.into_owned(),
    }
}

/// Decode a log file written by the platform: UTF-8 first, then windows-1251.
pub fn decode_log(bytes: &[u8]) -> String {
    decode_utf8_or(encoding_rs::WINDOWS_1251, bytes)
}

/// Error for an unknown encoding label.
pub(crate) fn unknown_encoding(key: &str, label: &str) -> DesignerError {
    DesignerError::InvalidConfig(key.to_string(), format!("unknown encoding '{}'", label))
}
