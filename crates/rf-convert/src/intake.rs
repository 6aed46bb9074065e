//! File intake filter
//!
//! Only WAV sources become jobs. Anything else is dropped before a job is
//! created.

use std::path::Path;

use crate::config::WAV_MIME_TYPE;

/// Accept by `.wav` extension (any case) or `audio/wav` MIME type
pub fn is_wav_source(name: &str, mime: Option<&str>) -> bool {
    let mime_ok = mime.is_some_and(|m| m.trim().eq_ignore_ascii_case(WAV_MIME_TYPE));
    mime_ok || has_wav_extension(Path::new(name))
}

/// `.wav` extension, case-insensitive
pub fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Display name for a path source
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
