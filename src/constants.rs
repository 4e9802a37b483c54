//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// X11 protocol constants
pub mod x11 {
    /// Size of PID property value in bytes
    pub const PID_PROPERTY_SIZE: usize = 4;

    /// Upper bound (in 32-bit units) when reading text properties
    pub const TEXT_PROPERTY_LENGTH: u32 = 1024;

    /// Upper bound (in 32-bit units) when reading _NET_WM_ICON
    pub const ICON_PROPERTY_LENGTH: u32 = u32::MAX / 4;

    /// Largest icon edge we keep from _NET_WM_ICON
    pub const MAX_ICON_EDGE: u32 = 256;
}

/// Window enumeration filters
pub mod filtering {
    /// Windows must be strictly larger than this in both dimensions
    /// (drops tooltips, tray stubs and helper windows)
    pub const MIN_WINDOW_DIMENSION: i32 = 100;

    /// Process name used when the owning process cannot be resolved
    pub const UNKNOWN_PROCESS: &str = "Unknown";
}

/// Config storage locations
pub mod config {
    /// Directory under the XDG config dir
    pub const APP_DIR: &str = "window-sizer";

    /// Record collection file name
    pub const FILENAME: &str = "window_configs.json";

    /// Icon asset folder next to the record file
    pub const ICONS_DIR: &str = "config_icons";

    /// Application settings file name
    pub const SETTINGS_FILENAME: &str = "settings.json";

    /// Infix for timestamped backups: `window_configs.json.backup.<secs>`
    pub const BACKUP_INFIX: &str = "backup";
}

/// Icon file naming
pub mod icons {
    /// Maximum sanitized file name length (characters)
    pub const MAX_FILENAME_LENGTH: usize = 100;

    /// Fallback name when sanitization leaves nothing
    pub const UNNAMED: &str = "unnamed";

    /// Number of title characters used for the per-title icon key
    pub const TITLE_KEY_LENGTH: usize = 30;

    /// Icon asset extension
    pub const EXTENSION: &str = "png";

    /// Process suffix stripped from icon base names
    pub const EXE_SUFFIX: &str = ".exe";
}

/// Scheduler timing
pub mod scheduler {
    use std::time::Duration;

    /// Liveness/reconciliation tick period
    pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

    /// Pause between records during auto-apply reconciliation
    pub const AUTO_APPLY_DELAY: Duration = Duration::from_millis(50);

    /// Pause between records during bulk apply
    pub const BULK_APPLY_DELAY: Duration = Duration::from_millis(100);

    /// Granularity at which the watch loop checks for shutdown
    pub const SHUTDOWN_POLL: Duration = Duration::from_millis(200);
}

/// Pagination defaults for record listings
pub mod paging {
    pub const DEFAULT_PAGE_SIZE: usize = 10;
}

/// Filesystem paths
pub mod paths {
    /// Process name source (`{}` replaced by PID)
    pub const PROC_COMM_FORMAT: &str = "/proc/{}/comm";
}
