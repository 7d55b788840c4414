//! Disk usage of an artifact directory.

use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

/// File count and total size of everything beneath a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Footprint {
    pub files: usize,
    pub bytes: u64,
}

/// Walk `root` and total up its regular files.
///
/// Symlinks are not followed, so a `basedir` link never pulls the parent
/// artifact into the count.
pub fn measure(root: &Path) -> std::io::Result<Footprint> {
    let mut footprint = Footprint::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        footprint.files += 1;
        footprint.bytes += entry.metadata()?.len();
    }

    Ok(footprint)
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
