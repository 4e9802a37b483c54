//! Application façade
//!
//! Everything the CLI (or any other front end) does goes through `Manager`:
//! capture and save windows, apply geometry, manage the record collection and
//! settings. The store is shared so the watch loop and bulk-apply workers see
//! the same collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::applier::{ApplyOutcome, GeometryApplier};
use crate::config::{AppSettings, ConfigRecord, ConfigStore, ImportSummary, SettingsStore, SharedStore};
use crate::config::store;
use crate::error::{ApplyError, ManagerError, StoreError};
use crate::icons::{IconFolder, IconResolver};
use crate::matcher;
use crate::scheduler::{AutoApplyScheduler, BatchReport, SchedulerOptions};
use crate::snapshot::{SnapshotProvider, WindowReport, WindowSnapshot};
use crate::types::{Geometry, WindowHandle};
use crate::window_system::{IconImage, WindowSystem};

/// One page of a (possibly filtered) record listing
#[derive(Debug, Clone)]
pub struct RecordPage {
    /// `(store index, record)` pairs
    pub entries: Vec<(usize, ConfigRecord)>,
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct WindowDiagnosis {
    pub report: WindowReport,
    /// Result of re-applying the window's own rectangle; `None` when it has none
    pub trial: Option<Result<ApplyOutcome, ApplyError>>,
}

#[derive(Debug)]
pub struct Diagnosis {
    pub pid: u32,
    pub process_name: Option<String>,
    pub windows: Vec<WindowDiagnosis>,
}

pub struct Manager {
    settings: AppSettings,
    settings_store: Box<dyn SettingsStore>,
    store: SharedStore,
    snapshots: Arc<SnapshotProvider>,
    applier: GeometryApplier,
    icons: Box<dyn IconResolver>,
}

impl Manager {
    pub fn with_settings(
        system: Arc<dyn WindowSystem>,
        settings_store: Box<dyn SettingsStore>,
        settings: AppSettings,
    ) -> Self {
        let store = ConfigStore::open(settings.config_file()).shared();
        let icons = Box::new(IconFolder::new(settings.icons_dir()));
        Self {
            settings,
            settings_store,
            store,
            snapshots: Arc::new(SnapshotProvider::new(system.clone())),
            applier: GeometryApplier::new(system),
            icons,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn records(&self) -> Vec<ConfigRecord> {
        self.store.lock().records().to_vec()
    }

    pub fn scheduler(&self, options: SchedulerOptions) -> AutoApplyScheduler {
        AutoApplyScheduler::new(self.snapshots.clone(), self.applier.clone(), options)
    }

    pub fn list_windows(&self) -> Result<Vec<WindowSnapshot>, ManagerError> {
        self.snapshots.list_windows().map_err(ManagerError::Enumeration)
    }

    fn find_window(&self, title: &str, process: &str) -> Result<Option<WindowSnapshot>, ManagerError> {
        let windows = self.list_windows()?;
        Ok(matcher::find_match(&windows, title, process).cloned())
    }

    fn record_at(&self, index: usize) -> Result<ConfigRecord, ManagerError> {
        let store = self.store.lock();
        store.get(index).cloned().ok_or_else(|| {
            StoreError::IndexOutOfRange {
                index,
                len: store.len(),
            }
            .into()
        })
    }

    /// Save a live window's geometry, updating an existing record in place
    pub fn save_window(&self, window: &WindowSnapshot, geometry: Geometry) -> Result<usize, ManagerError> {
        let class_name = Some(window.class_name.clone()).filter(|c| !c.is_empty());
        self.upsert(
            &window.title,
            &window.process_name,
            class_name,
            window.icon.as_deref(),
            geometry,
        )
    }

    /// Save by identity key. Without explicit geometry the matching live
    /// window's current rectangle is used.
    pub fn save(&self, title: &str, process: &str, geometry: Option<Geometry>) -> Result<usize, ManagerError> {
        match (self.find_window(title, process)?, geometry) {
            (Some(window), geometry) => {
                let geometry = geometry.unwrap_or_else(|| window.rect.geometry());
                self.save_window(&window, geometry)
            }
            (None, Some(geometry)) => self.upsert(title, process, None, None, geometry),
            (None, None) => Err(ManagerError::NoMatchingWindow {
                title: title.to_string(),
                process: process.to_string(),
            }),
        }
    }

    /// Save a window exactly where it is now
    pub fn capture(&self, handle: WindowHandle) -> Result<usize, ManagerError> {
        let window = self
            .snapshots
            .snapshot(handle)
            .map_err(|source| ManagerError::Window { handle, source })?;
        self.save_window(&window, window.rect.geometry())
    }

    fn upsert(
        &self,
        title: &str,
        process: &str,
        class_name: Option<String>,
        icon: Option<&IconImage>,
        geometry: Geometry,
    ) -> Result<usize, ManagerError> {
        let mut record = ConfigRecord::new(title, process, geometry);
        record.class_name = class_name;

        let mut store = self.store.lock();
        if let Some(index) = store.find_by_identity(title, process) {
            if let Some(existing) = store.get(index) {
                record.custom_name = existing.custom_name.clone();
                record.enabled = existing.enabled;
                record.icon_file = existing.icon_file.clone();
                record.created_at = existing.created_at;
                record.extra = existing.extra.clone();
                if record.class_name.is_none() {
                    record.class_name = existing.class_name.clone();
                }
            }
            store.update(index, record)?;
            return Ok(index);
        }

        if let Some(icon) = icon {
            match self.icons.save(&record.display_name(), icon) {
                Ok(filename) => record.icon_file = Some(filename),
                Err(e) => warn!(config = %record.display_name(), error = %e, "Failed to save window icon"),
            }
        }
        Ok(store.add(record)?)
    }

    /// Apply one saved record to its matching live window
    pub fn apply_record(&self, index: usize) -> Result<ApplyOutcome, ManagerError> {
        let record = self.record_at(index)?;
        let window = self
            .find_window(&record.title, &record.process)?
            .ok_or_else(|| ManagerError::NoMatchingWindow {
                title: record.title.clone(),
                process: record.process.clone(),
            })?;
        Ok(self.applier.apply(window.handle, record.geometry())?)
    }

    /// Apply a geometry directly to a handle. A closed window is an error here.
    pub fn apply_to(&self, handle: WindowHandle, geometry: Geometry) -> Result<ApplyOutcome, ManagerError> {
        Ok(self.applier.apply(handle, geometry)?)
    }

    /// Apply every enabled record on a worker thread and wait for the result
    pub fn apply_all(&self, options: SchedulerOptions) -> Result<BatchReport, ManagerError> {
        self.scheduler(options)
            .spawn_apply_all(self.store.clone())
            .join()
            .map_err(|_| ManagerError::WorkerPanicked)
    }

    pub fn rename(&self, index: usize, name: &str) -> Result<(), ManagerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ManagerError::EmptyName);
        }

        let record = self.record_at(index)?;
        let icon_file = match record.icon_file.as_deref() {
            Some(old_file) => match self.icons.rename(old_file, name) {
                Ok(renamed) => renamed,
                Err(e) => {
                    warn!(icon = old_file, error = %e, "Failed to rename icon, keeping old file name");
                    None
                }
            },
            None => None,
        };

        self.store.lock().rename(index, name.to_string(), icon_file)?;
        Ok(())
    }

    pub fn set_enabled(&self, index: usize, enabled: bool) -> Result<(), ManagerError> {
        Ok(self.store.lock().set_enabled(index, enabled)?)
    }

    pub fn delete(&self, index: usize) -> Result<ConfigRecord, ManagerError> {
        Ok(self.store.lock().delete(index)?)
    }

    /// Filter by keyword (empty matches everything), then paginate.
    /// `page` is clamped into `1..=page_count`.
    pub fn query(&self, keyword: &str, page: usize, page_size: usize) -> RecordPage {
        let store = self.store.lock();
        let matches: Vec<(usize, ConfigRecord)> = store
            .query(keyword)
            .into_iter()
            .map(|(index, record)| (index, record.clone()))
            .collect();

        let page_count = store::page_count(matches.len(), page_size);
        let page = page.clamp(1, page_count);
        RecordPage {
            entries: store::page(&matches, page, page_size).to_vec(),
            page,
            page_count,
            total: matches.len(),
        }
    }

    pub fn import(&self, path: &Path) -> Result<ImportSummary, ManagerError> {
        Ok(self.store.lock().import(path)?)
    }

    pub fn export(&self, path: &Path) -> Result<(), ManagerError> {
        Ok(self.store.lock().export(path)?)
    }

    pub fn backup(&self) -> Result<PathBuf, ManagerError> {
        Ok(self.store.lock().backup()?)
    }

    pub fn restore(&self, path: &Path) -> Result<usize, ManagerError> {
        Ok(self.store.lock().restore(path)?)
    }

    /// Icon file to show for a record, if any candidate exists on disk
    pub fn icon_for(&self, index: usize) -> Result<Option<PathBuf>, ManagerError> {
        let record = self.record_at(index)?;
        Ok(self.icons.resolve(&record))
    }

    /// Move storage to `dir` (which must exist) and reload from there
    pub fn set_storage_dir(&mut self, dir: &Path) -> Result<(), ManagerError> {
        if !dir.is_dir() {
            return Err(ManagerError::StorageDirMissing(dir.to_path_buf()));
        }

        let mut settings = self.settings.clone();
        settings.config_dir = dir.to_path_buf();
        let icons_dir = settings.icons_dir();
        fs::create_dir_all(&icons_dir).map_err(|source| ManagerError::StorageDir {
            path: icons_dir.clone(),
            source,
        })?;
        settings
            .save_config_dir(self.settings_store.as_mut())
            .map_err(|e| ManagerError::Settings(format!("{e:#}")))?;

        *self.store.lock() = ConfigStore::open(settings.config_file());
        self.icons = Box::new(IconFolder::new(icons_dir));
        self.settings = settings;
        info!(dir = %dir.display(), "Switched config storage directory");
        Ok(())
    }

    /// Change the toggles; the storage directory only moves via `set_storage_dir`
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut AppSettings)) -> Result<(), ManagerError> {
        let mut settings = self.settings.clone();
        edit(&mut settings);
        settings.config_dir = self.settings.config_dir.clone();

        settings
            .save_preferences(self.settings_store.as_mut())
            .map_err(|e| ManagerError::Settings(format!("{e:#}")))?;
        self.settings = settings;
        Ok(())
    }

    /// Report every window owned by `pid`, probing each with an apply of its
    /// own rectangle (which must never move it)
    pub fn diagnose(&self, pid: u32) -> Result<Diagnosis, ManagerError> {
        let reports = self
            .snapshots
            .windows_for_pid(pid)
            .map_err(ManagerError::Enumeration)?;

        let windows = reports
            .into_iter()
            .map(|report| {
                let trial = report
                    .rect
                    .filter(|_| report.visible == Some(true))
                    .map(|rect| self.applier.apply(report.handle, rect.geometry()));
                WindowDiagnosis { report, trial }
            })
            .collect();

        Ok(Diagnosis {
            pid,
            process_name: self.snapshots.process_name(pid),
            windows,
        })
    }
}
