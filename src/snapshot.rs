//! Window enumeration and per-pass snapshots

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::constants::filtering;
use crate::error::WindowSystemError;
use crate::types::{Rect, WindowHandle};
use crate::window_system::{IconImage, WindowSystem};

/// One window as seen during a single enumeration pass
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub handle: WindowHandle,
    pub title: String,
    pub class_name: String,
    pub pid: Option<u32>,
    pub process_name: String,
    pub rect: Rect,
    pub icon: Option<Arc<IconImage>>,
}

/// Unfiltered per-window report used by diagnostics.
/// Every field is best-effort and `None` when the query failed.
#[derive(Debug, Clone)]
pub struct WindowReport {
    pub handle: WindowHandle,
    pub title: Option<String>,
    pub class_name: Option<String>,
    pub visible: Option<bool>,
    pub rect: Option<Rect>,
}

type IconCacheKey = (WindowHandle, String);

pub struct SnapshotProvider {
    system: Arc<dyn WindowSystem>,
    icon_cache: Mutex<HashMap<IconCacheKey, Option<Arc<IconImage>>>>,
}

impl SnapshotProvider {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self {
            system,
            icon_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Visible, titled top-level windows larger than the helper-window threshold.
    /// Each call re-enumerates; no ordering guarantee across calls.
    pub fn list_windows(&self) -> Result<Vec<WindowSnapshot>, WindowSystemError> {
        let handles = self.system.top_level_windows()?;
        let mut snapshots = Vec::with_capacity(handles.len());

        for handle in handles {
            match self.filtered_snapshot(handle) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(e) => debug!(window = %handle, error = %e, "Skipping window that vanished during enumeration"),
            }
        }

        self.prune_icon_cache(&snapshots);
        Ok(snapshots)
    }

    fn filtered_snapshot(&self, handle: WindowHandle) -> Result<Option<WindowSnapshot>, WindowSystemError> {
        if !self.system.is_visible(handle)? {
            return Ok(None);
        }
        let title = self.system.title(handle)?;
        if title.is_empty() {
            return Ok(None);
        }
        let rect = self.system.rect(handle)?;
        if rect.width() <= filtering::MIN_WINDOW_DIMENSION || rect.height() <= filtering::MIN_WINDOW_DIMENSION {
            return Ok(None);
        }
        Ok(Some(self.build(handle, title, rect)))
    }

    /// Snapshot a specific window without the enumeration filters
    pub fn snapshot(&self, handle: WindowHandle) -> Result<WindowSnapshot, WindowSystemError> {
        if !self.system.is_visible(handle)? {
            return Err(WindowSystemError::NoSuchWindow);
        }
        let title = self.system.title(handle)?;
        let rect = self.system.rect(handle)?;
        Ok(self.build(handle, title, rect))
    }

    fn build(&self, handle: WindowHandle, title: String, rect: Rect) -> WindowSnapshot {
        let class_name = self.system.class_name(handle).unwrap_or_default();
        let pid = self.system.pid(handle).ok().flatten();
        let process_name = pid
            .and_then(|pid| self.system.process_name(pid))
            .unwrap_or_else(|| filtering::UNKNOWN_PROCESS.to_string());
        let icon = self.icon_for(handle, &process_name);

        WindowSnapshot {
            handle,
            title,
            class_name,
            pid,
            process_name,
            rect,
            icon,
        }
    }

    fn icon_for(&self, handle: WindowHandle, process_name: &str) -> Option<Arc<IconImage>> {
        let key = (handle, process_name.to_string());
        if let Some(cached) = self.icon_cache.lock().get(&key) {
            return cached.clone();
        }

        let icon = self.system.icon(handle).filter(|icon| !icon.is_empty()).map(Arc::new);
        self.icon_cache.lock().insert(key, icon.clone());
        icon
    }

    /// Drop cached icons whose window is gone (handles can be reused)
    fn prune_icon_cache(&self, live: &[WindowSnapshot]) {
        let live: HashSet<WindowHandle> = live.iter().map(|s| s.handle).collect();
        self.icon_cache.lock().retain(|(handle, _), _| live.contains(handle));
    }

    /// True iff the handle still refers to an existing, visible window
    pub fn is_window_valid(&self, handle: WindowHandle) -> bool {
        self.system.is_visible(handle).unwrap_or(false)
    }

    pub fn get_window_rect(&self, handle: WindowHandle) -> Option<Rect> {
        self.system.rect(handle).ok()
    }

    /// Every managed window owned by `pid`, unfiltered
    pub fn windows_for_pid(&self, pid: u32) -> Result<Vec<WindowReport>, WindowSystemError> {
        let handles = self.system.top_level_windows()?;
        Ok(handles
            .into_iter()
            .filter(|&handle| self.system.pid(handle).ok().flatten() == Some(pid))
            .map(|handle| WindowReport {
                handle,
                title: self.system.title(handle).ok(),
                class_name: self.system.class_name(handle).ok(),
                visible: self.system.is_visible(handle).ok(),
                rect: self.system.rect(handle).ok(),
            })
            .collect())
    }

    pub fn process_name(&self, pid: u32) -> Option<String> {
        self.system.process_name(pid)
    }
}
