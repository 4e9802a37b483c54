//! OS window layer
//!
//! Every call that touches live windows goes through [`WindowSystem`], so the
//! matching and scheduling code can run against the X11 server or against a
//! scripted fake in tests.

mod x11;

#[cfg(test)]
pub mod fake;

pub use x11::X11WindowSystem;

use crate::error::WindowSystemError;
use crate::types::{Geometry, Rect, WindowHandle};

/// Raw icon pixels as delivered by the window (ARGB32, `0xAARRGGBB`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl IconImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.len() < (self.width * self.height) as usize
    }

    /// Nearest-neighbour scale to a square RGBA8 buffer
    pub fn to_rgba(&self, size: u32) -> Vec<u8> {
        let mut dst = vec![0u8; (size * size * 4) as usize];
        if self.is_empty() {
            return dst;
        }

        for y in 0..size {
            for x in 0..size {
                let src_x = (x * self.width / size).min(self.width - 1) as usize;
                let src_y = (y * self.height / size).min(self.height - 1) as usize;
                let pixel = self.pixels[src_y * self.width as usize + src_x];

                let dst_idx = ((y * size + x) * 4) as usize;
                dst[dst_idx] = ((pixel >> 16) & 0xFF) as u8;
                dst[dst_idx + 1] = ((pixel >> 8) & 0xFF) as u8;
                dst[dst_idx + 2] = (pixel & 0xFF) as u8;
                dst[dst_idx + 3] = ((pixel >> 24) & 0xFF) as u8;
            }
        }

        dst
    }
}

/// Primitive window operations provided by the platform
///
/// Handles are capability tokens: any call may fail with
/// [`WindowSystemError::NoSuchWindow`] because another process closed the window.
pub trait WindowSystem: Send + Sync {
    /// All managed top-level windows, in the platform's enumeration order
    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, WindowSystemError>;

    /// Whether the window is currently mapped and not hidden
    fn is_visible(&self, window: WindowHandle) -> Result<bool, WindowSystemError>;

    fn title(&self, window: WindowHandle) -> Result<String, WindowSystemError>;

    fn class_name(&self, window: WindowHandle) -> Result<String, WindowSystemError>;

    /// Owning process id, `None` when the window does not advertise one
    fn pid(&self, window: WindowHandle) -> Result<Option<u32>, WindowSystemError>;

    /// Outer rectangle in root-window coordinates
    fn rect(&self, window: WindowHandle) -> Result<Rect, WindowSystemError>;

    fn process_name(&self, pid: u32) -> Option<String>;

    /// Best-effort icon lookup; never fails, just returns `None`
    fn icon(&self, window: WindowHandle) -> Option<IconImage>;

    /// Single positioning request: position and size only.
    /// Must not restack or focus the window.
    fn move_resize(&self, window: WindowHandle, geometry: Geometry) -> Result<(), WindowSystemError>;
}
