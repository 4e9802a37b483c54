//! Identity matching between live windows and configuration records
//!
//! Identity is the exact `(title, process)` pair. No fuzzy or substring
//! matching: a window whose title drifts after being configured simply stops
//! matching, which is preferred over moving the wrong window.

use crate::config::ConfigRecord;
use crate::constants::icons;
use crate::icons::sanitize_filename;
use crate::snapshot::WindowSnapshot;
use crate::types::{Geometry, Rect};

/// First window in enumeration order with this identity key.
///
/// Several live windows can share a key (two "Console" windows of one app);
/// only the first is ever matched.
pub fn find_match<'a>(snapshots: &'a [WindowSnapshot], title: &str, process: &str) -> Option<&'a WindowSnapshot> {
    snapshots
        .iter()
        .find(|window| window.title == title && window.process_name == process)
}

pub fn find_record(records: &[ConfigRecord], title: &str, process: &str) -> Option<usize> {
    records.iter().position(|record| record.matches(title, process))
}

/// Whether a live rectangle differs from the target in any of x, y, width, height
pub fn needs_apply(current: Rect, target: Geometry) -> bool {
    current.geometry() != target
}

/// Every `.exe` occurrence is removed, not just a trailing one, so names line
/// up with icon caches written by older releases
fn icon_base_name(process: &str) -> String {
    process.replace(icons::EXE_SUFFIX, "")
}

/// Icon file names to try for a record, most specific first:
/// explicit file, process+class, process+title prefix, generic process icon
pub fn icon_lookup_candidates(record: &ConfigRecord) -> Vec<String> {
    let mut candidates = Vec::with_capacity(4);

    if let Some(icon_file) = record.icon_file.as_deref().filter(|f| !f.is_empty()) {
        candidates.push(icon_file.to_string());
    }

    if record.process.is_empty() {
        return candidates;
    }
    let base = icon_base_name(&record.process);

    if let Some(class_name) = record.class_name.as_deref().filter(|c| !c.is_empty()) {
        candidates.push(format!("{base}_{}.{}", sanitize_filename(class_name), icons::EXTENSION));
    }

    if !record.title.is_empty() {
        let title_key: String = record.title.chars().take(icons::TITLE_KEY_LENGTH).collect();
        candidates.push(format!("{base}_{}.{}", sanitize_filename(&title_key), icons::EXTENSION));
    }

    candidates.push(format!("{base}.{}", icons::EXTENSION));
    candidates
}
