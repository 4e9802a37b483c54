//! Scripted window system for tests
//!
//! Simulates a window table with handle invalidation, permission failures and
//! a log of every positioning request.

use parking_lot::Mutex;

use super::{IconImage, WindowSystem};
use crate::error::WindowSystemError;
use crate::types::{Geometry, Rect, WindowHandle};

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub class_name: String,
    pub pid: Option<u32>,
    pub rect: Rect,
    pub visible: bool,
    pub icon: Option<IconImage>,
    pub deny_moves: bool,
    pub move_failure: Option<String>,
}

impl FakeWindow {
    pub fn new(handle: u32, title: &str, pid: u32, rect: Rect) -> Self {
        Self {
            handle: WindowHandle(handle),
            title: title.to_string(),
            class_name: "FakeClass".to_string(),
            pid: Some(pid),
            rect,
            visible: true,
            icon: None,
            deny_moves: false,
            move_failure: None,
        }
    }

    pub fn class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_icon(mut self, icon: IconImage) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn denying_moves(mut self) -> Self {
        self.deny_moves = true;
        self
    }

    pub fn failing_moves(mut self, detail: &str) -> Self {
        self.move_failure = Some(detail.to_string());
        self
    }
}

/// A window that disappears partway through a pass
struct PendingClose {
    handle: WindowHandle,
    checks_left: usize,
    replacement: Option<FakeWindow>,
}

#[derive(Default)]
pub struct FakeWindowSystem {
    windows: Mutex<Vec<FakeWindow>>,
    processes: Mutex<Vec<(u32, String)>>,
    moves: Mutex<Vec<(WindowHandle, Geometry)>>,
    icon_lookups: Mutex<usize>,
    pending_close: Mutex<Option<PendingClose>>,
}

impl FakeWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(self, pid: u32, name: &str) -> Self {
        self.processes.lock().push((pid, name.to_string()));
        self
    }

    pub fn with_window(self, window: FakeWindow) -> Self {
        self.add_window(window);
        self
    }

    pub fn add_window(&self, window: FakeWindow) {
        self.windows.lock().push(window);
    }

    /// Simulate another process closing the window
    pub fn close(&self, handle: u32) {
        self.windows.lock().retain(|w| w.handle != WindowHandle(handle));
    }

    /// Close `handle` right before its `nth` visibility check (1-based).
    /// Enumeration performs the first check, so `nth = 2` closes the window
    /// between enumeration and whatever uses the handle next.
    pub fn close_at_check(&self, handle: u32, nth: usize) {
        self.schedule_close(handle, nth, None);
    }

    /// Like [`close_at_check`](Self::close_at_check), but a new window with a
    /// different handle takes its place, as when an application recreates it
    pub fn replace_at_check(&self, handle: u32, nth: usize, replacement: FakeWindow) {
        self.schedule_close(handle, nth, Some(replacement));
    }

    fn schedule_close(&self, handle: u32, nth: usize, replacement: Option<FakeWindow>) {
        *self.pending_close.lock() = Some(PendingClose {
            handle: WindowHandle(handle),
            checks_left: nth,
            replacement,
        });
    }

    fn run_pending_close(&self, checked: WindowHandle) {
        let mut pending = self.pending_close.lock();
        let Some(close) = pending.as_mut().filter(|c| c.handle == checked) else {
            return;
        };
        close.checks_left = close.checks_left.saturating_sub(1);
        if close.checks_left > 0 {
            return;
        }
        let Some(close) = pending.take() else {
            return;
        };
        drop(pending);

        let mut windows = self.windows.lock();
        windows.retain(|w| w.handle != close.handle);
        windows.extend(close.replacement);
    }

    /// Simulate the user dragging the window elsewhere
    pub fn set_rect(&self, handle: u32, rect: Rect) {
        if let Some(window) = self.windows.lock().iter_mut().find(|w| w.handle == WindowHandle(handle)) {
            window.rect = rect;
        }
    }

    pub fn rect_of(&self, handle: u32) -> Option<Rect> {
        self.windows
            .lock()
            .iter()
            .find(|w| w.handle == WindowHandle(handle))
            .map(|w| w.rect)
    }

    /// Enumeration order doubles as stacking order
    pub fn stacking(&self) -> Vec<WindowHandle> {
        self.windows.lock().iter().map(|w| w.handle).collect()
    }

    pub fn moves(&self) -> Vec<(WindowHandle, Geometry)> {
        self.moves.lock().clone()
    }

    pub fn icon_lookups(&self) -> usize {
        *self.icon_lookups.lock()
    }

    fn with<T>(&self, handle: WindowHandle, f: impl FnOnce(&FakeWindow) -> T) -> Result<T, WindowSystemError> {
        self.windows
            .lock()
            .iter()
            .find(|w| w.handle == handle)
            .map(f)
            .ok_or(WindowSystemError::NoSuchWindow)
    }
}

impl WindowSystem for FakeWindowSystem {
    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, WindowSystemError> {
        Ok(self.stacking())
    }

    fn is_visible(&self, window: WindowHandle) -> Result<bool, WindowSystemError> {
        self.run_pending_close(window);
        self.with(window, |w| w.visible)
    }

    fn title(&self, window: WindowHandle) -> Result<String, WindowSystemError> {
        self.with(window, |w| w.title.clone())
    }

    fn class_name(&self, window: WindowHandle) -> Result<String, WindowSystemError> {
        self.with(window, |w| w.class_name.clone())
    }

    fn pid(&self, window: WindowHandle) -> Result<Option<u32>, WindowSystemError> {
        self.with(window, |w| w.pid)
    }

    fn rect(&self, window: WindowHandle) -> Result<Rect, WindowSystemError> {
        self.with(window, |w| w.rect)
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.processes
            .lock()
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, name)| name.clone())
    }

    fn icon(&self, window: WindowHandle) -> Option<IconImage> {
        *self.icon_lookups.lock() += 1;
        self.with(window, |w| w.icon.clone()).ok().flatten()
    }

    fn move_resize(&self, window: WindowHandle, geometry: Geometry) -> Result<(), WindowSystemError> {
        let mut windows = self.windows.lock();
        let target = windows
            .iter_mut()
            .find(|w| w.handle == window)
            .ok_or(WindowSystemError::NoSuchWindow)?;
        if target.deny_moves {
            return Err(WindowSystemError::AccessDenied);
        }
        if let Some(detail) = &target.move_failure {
            return Err(WindowSystemError::Other(detail.clone()));
        }
        target.rect = geometry.to_rect();
        self.moves.lock().push((window, geometry));
        Ok(())
    }
}
