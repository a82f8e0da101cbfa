//! Log hygiene for user-controlled names.
//!
//! Uploaded filenames can contain anything. Log lines and span attributes
//! carry a short deterministic tag instead of the raw name, keeping the
//! extension so operators can still tell a photo from a spreadsheet.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Replaces a user-supplied filename with a short deterministic tag,
/// preserving the extension.
///
/// `invoice march.pdf` becomes something like `d41d8c7f.pdf`. The same
/// name always maps to the same tag, so one file can be followed across
/// log lines.
pub fn redact_filename(name: &str) -> String {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let tag = format!("{:08x}", hasher.finish() as u32);

    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", tag, ext),
        None => tag,
    }
}
