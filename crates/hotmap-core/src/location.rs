//! Resource locations.
//!
//! Loaded entries remember where they came from. Locations inside an
//! archive are written as `archive[inner/path]`, and some loaders
//! describe plain files as `file [/abs/path]`.

use std::path::{Path, PathBuf};

/// Strips a bracketed inner-resource suffix down to the path it refers to.
pub fn normalize_location(location: &str) -> String {
    match (location.find('['), location.rfind(']')) {
        (Some(open), Some(close)) if close > open => location[open + 1..close].trim().to_string(),
        _ => location.trim().to_string(),
    }
}

/// Resource string recorded for a descriptor loaded from `path`.
pub fn location_of(path: &Path) -> String {
    path.display().to_string()
}

/// The filesystem path a recorded location points at.
pub fn path_of(location: &str) -> PathBuf {
    PathBuf::from(normalize_location(location))
}

/// True if two locations refer to the same descriptor.
pub fn same_location(a: &str, b: &str) -> bool {
    normalize_location(a) == normalize_location(b)
}
