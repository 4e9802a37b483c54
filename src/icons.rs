//! Icon asset folder
//!
//! Icons are cached as PNG files next to the record file. Matching and storage
//! never depend on them; they only ask the resolver which file, if any, exists
//! for a record.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ConfigRecord;
use crate::constants::icons;
use crate::error::IconError;
use crate::matcher;
use crate::window_system::IconImage;

/// Edge length of saved icon files
const SAVED_ICON_SIZE: u32 = 32;

/// Make an arbitrary string safe to use as a file name
///
/// Replaces `< > : " / \ | ? *` and ASCII control characters with `_`, trims
/// leading/trailing dots and spaces, caps the length at 100 characters and
/// falls back to "unnamed".
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    let truncated: String = trimmed.chars().take(icons::MAX_FILENAME_LENGTH).collect();

    if truncated.is_empty() {
        icons::UNNAMED.to_string()
    } else {
        truncated
    }
}

fn icon_filename(name: &str) -> String {
    format!("{}.{}", sanitize_filename(name), icons::EXTENSION)
}

/// Capability interface for icon storage
pub trait IconResolver: Send + Sync {
    /// First candidate in the lookup chain that exists and holds an image
    fn resolve(&self, record: &ConfigRecord) -> Option<PathBuf>;

    /// Store an icon under the given display name, returning its file name
    fn save(&self, name: &str, icon: &IconImage) -> Result<String, IconError>;

    /// Rename an icon file to match a new display name.
    /// `Ok(None)` when there was nothing on disk to rename.
    fn rename(&self, old_file: &str, new_name: &str) -> Result<Option<String>, IconError>;
}

/// PNG files in a single directory
pub struct IconFolder {
    dir: PathBuf,
}

impl IconFolder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Non-empty file whose header decodes as PNG
    fn is_usable_image(path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        if file.metadata().map(|m| m.len() == 0).unwrap_or(true) {
            return false;
        }
        png::Decoder::new(BufReader::new(file)).read_info().is_ok()
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IconError + '_ {
        move |source| IconError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl IconResolver for IconFolder {
    fn resolve(&self, record: &ConfigRecord) -> Option<PathBuf> {
        matcher::icon_lookup_candidates(record)
            .into_iter()
            .map(|candidate| self.path_for(&candidate))
            .find(|path| Self::is_usable_image(path))
    }

    fn save(&self, name: &str, icon: &IconImage) -> Result<String, IconError> {
        if icon.is_empty() {
            return Err(IconError::EmptyImage);
        }

        fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;
        let filename = icon_filename(name);
        let path = self.path_for(&filename);

        let file = File::create(&path).map_err(Self::io_error(&path))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), SAVED_ICON_SIZE, SAVED_ICON_SIZE);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&icon.to_rgba(SAVED_ICON_SIZE))?;
        writer.finish()?;

        info!(path = %path.display(), "Saved window icon");
        Ok(filename)
    }

    fn rename(&self, old_file: &str, new_name: &str) -> Result<Option<String>, IconError> {
        let old_path = self.path_for(old_file);
        if !old_path.exists() {
            debug!(path = %old_path.display(), "No icon file to rename");
            return Ok(None);
        }

        let new_file = icon_filename(new_name);
        let new_path = self.path_for(&new_file);
        if new_path == old_path {
            return Ok(Some(new_file));
        }

        if new_path.exists() {
            fs::remove_file(&new_path).map_err(Self::io_error(&new_path))?;
        }
        fs::rename(&old_path, &new_path).map_err(Self::io_error(&new_path))?;
        info!(from = %old_path.display(), to = %new_path.display(), "Renamed icon file");
        Ok(Some(new_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Geometry;

    fn sample_icon() -> IconImage {
        IconImage {
            width: 2,
            height: 2,
            pixels: vec![0xFF_FF_00_00; 4],
        }
    }

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("tab\there\u{1}"), "tab_here_");
    }

    #[test]
    fn test_sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_filename("  ..name.. "), "name");
        assert_eq!(sanitize_filename(" . . "), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "é".repeat(150);
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.chars().count(), 100);
    }

    #[test]
    fn test_save_and_resolve_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path().join("config_icons"));

        let filename = folder.save("Editor: main", &sample_icon()).unwrap();
        assert_eq!(filename, "Editor_ main.png");

        let mut record = ConfigRecord::new("Untitled", "gedit", Geometry::new(0, 0, 10, 10));
        record.icon_file = Some(filename.clone());
        assert_eq!(folder.resolve(&record), Some(folder.dir().join(filename)));
    }

    #[test]
    fn test_resolve_falls_back_to_process_icon() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        folder.save("firefox", &sample_icon()).unwrap();

        let mut record = ConfigRecord::new("Mozilla Firefox", "firefox.exe", Geometry::new(0, 0, 10, 10));
        record.icon_file = Some("missing.png".into());
        record.class_name = Some("MozillaWindowClass".into());

        assert_eq!(folder.resolve(&record), Some(dir.path().join("firefox.png")));
    }

    #[test]
    fn test_resolve_prefers_class_icon_over_title_icon() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        folder.save("code_Code", &sample_icon()).unwrap();
        folder.save("code_Project", &sample_icon()).unwrap();

        let mut record = ConfigRecord::new("Project", "code", Geometry::new(0, 0, 10, 10));
        record.class_name = Some("Code".into());

        assert_eq!(folder.resolve(&record), Some(dir.path().join("code_Code.png")));
    }

    #[test]
    fn test_resolve_skips_empty_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        fs::write(dir.path().join("app_Title.png"), b"").unwrap();
        fs::write(dir.path().join("app.png"), b"not a png").unwrap();

        let record = ConfigRecord::new("Title", "app", Geometry::new(0, 0, 10, 10));
        assert_eq!(folder.resolve(&record), None);
    }

    #[test]
    fn test_save_rejects_empty_icon() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        let empty = IconImage { width: 0, height: 0, pixels: Vec::new() };
        assert!(matches!(folder.save("x", &empty), Err(IconError::EmptyImage)));
    }

    #[test]
    fn test_rename_moves_file_and_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        let old = folder.save("Old Name", &sample_icon()).unwrap();
        fs::write(dir.path().join("New Name.png"), b"stale").unwrap();

        let renamed = folder.rename(&old, "New Name").unwrap();
        assert_eq!(renamed.as_deref(), Some("New Name.png"));
        assert!(!dir.path().join(&old).exists());
        assert!(IconFolder::is_usable_image(&dir.path().join("New Name.png")));
    }

    #[test]
    fn test_rename_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let folder = IconFolder::new(dir.path());
        assert_eq!(folder.rename("ghost.png", "Anything").unwrap(), None);
    }
}
