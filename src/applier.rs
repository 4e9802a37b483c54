//! Apply a target rectangle to a live window

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApplyError, WindowSystemError};
use crate::matcher;
use crate::types::{Geometry, WindowHandle};
use crate::window_system::WindowSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Window already had the target geometry; nothing was sent to the OS
    Unchanged,
}

#[derive(Clone)]
pub struct GeometryApplier {
    system: Arc<dyn WindowSystem>,
}

impl GeometryApplier {
    pub fn new(system: Arc<dyn WindowSystem>) -> Self {
        Self { system }
    }

    /// Move/resize `handle` to `geometry`. Issues at most one OS request and
    /// never touches stacking order or focus. Not retried on failure.
    pub fn apply(&self, handle: WindowHandle, geometry: Geometry) -> Result<ApplyOutcome, ApplyError> {
        if !geometry.has_positive_size() {
            return Err(ApplyError::InvalidGeometry(geometry));
        }

        match self.system.is_visible(handle) {
            Ok(true) => {}
            Ok(false) | Err(WindowSystemError::NoSuchWindow) => return Err(ApplyError::StaleHandle(handle)),
            Err(e) => return Err(ApplyError::from_system(handle, e)),
        }

        let current = self
            .system
            .rect(handle)
            .map_err(|e| ApplyError::from_system(handle, e))?;
        if !matcher::needs_apply(current, geometry) {
            debug!(window = %handle, geometry = %geometry, "Window already at target geometry");
            return Ok(ApplyOutcome::Unchanged);
        }

        self.system
            .move_resize(handle, geometry)
            .map_err(|e| ApplyError::from_system(handle, e))?;

        info!(window = %handle, geometry = %geometry, "Applied window geometry");
        Ok(ApplyOutcome::Applied)
    }
}
