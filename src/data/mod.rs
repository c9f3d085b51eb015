/// Read access to `.miz` archive entries
pub mod archive;
/// Reading a mission's theater without parsing the mission
pub mod probe;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use encoding_rs::WINDOWS_1252;

pub use archive::{ArchiveError, MizArchive};
pub use probe::{probe_theater, probe_theater_with, probe_theaters};

/// The serialized mission table.
pub const MISSION_ENTRY: &str = "mission";
/// Localized strings referenced by `DictKey_` values.
pub const DICTIONARY_ENTRY: &str = "l10n/DEFAULT/dictionary";
/// Directory holding briefing images.
pub const BRIEFING_IMAGE_PREFIX: &str = "l10n/DEFAULT/";
/// Directory holding kneeboard pages.
pub const KNEEBOARD_IMAGE_PREFIX: &str = "KNEEBOARD/";
/// Extensions recognised as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Theater reported when nothing better is known.
pub const UNKNOWN_THEATER: &str = "Unknown";

/// A shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Decodes entry text. UTF-8 is preferred, with a leading byte order mark
/// removed. Anything else is read as Windows-1252.
pub fn decode_text(bytes: Vec<u8>) -> String {
    let bytes = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest.to_vec(),
        None => bytes,
    };
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(err.as_bytes());
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_utf8_and_latin() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFmission".to_vec()), "mission");
        assert_eq!(decode_text("Caf\u{e9}".as_bytes().to_vec()), "Caf\u{e9}");
        assert_eq!(decode_text(b"Caf\xE9 \x80".to_vec()), "Caf\u{e9} \u{20ac}");
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
