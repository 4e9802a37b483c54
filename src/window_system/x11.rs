use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::*;
use x11rb::protocol::ErrorKind;
use x11rb::rust_connection::RustConnection;

use super::{IconImage, WindowSystem};
use crate::constants::{paths, x11};
use crate::error::WindowSystemError;
use crate::types::{Geometry, Rect, WindowHandle};

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_client_list: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
    pub net_wm_pid: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_icon: Atom,
    pub net_frame_extents: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .with_context(|| format!("Failed to intern {name} atom"))?
        .reply()
        .with_context(|| format!("Failed to get reply for {name} atom"))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_client_list: intern(conn, "_NET_CLIENT_LIST")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_pid: intern(conn, "_NET_WM_PID")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_hidden: intern(conn, "_NET_WM_STATE_HIDDEN")?,
            net_wm_icon: intern(conn, "_NET_WM_ICON")?,
            net_frame_extents: intern(conn, "_NET_FRAME_EXTENTS")?,
        })
    }
}

impl From<ConnectionError> for WindowSystemError {
    fn from(err: ConnectionError) -> Self {
        WindowSystemError::Other(err.to_string())
    }
}

impl From<ReplyError> for WindowSystemError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::X11Error(e) => match e.error_kind {
                ErrorKind::Access => WindowSystemError::AccessDenied,
                ErrorKind::Window | ErrorKind::Drawable => WindowSystemError::NoSuchWindow,
                other => WindowSystemError::Other(format!("X11 error {other:?}")),
            },
            ReplyError::ConnectionError(e) => e.into(),
        }
    }
}

/// EWMH-compliant window system backed by an X11 connection
pub struct X11WindowSystem {
    conn: RustConnection,
    root: Window,
    atoms: CachedAtoms,
}

impl X11WindowSystem {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 display")?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        info!(
            "successfully connected to x11: screen={screen_num}, dimensions={}x{}",
            screen.width_in_pixels, screen.height_in_pixels
        );

        let atoms = CachedAtoms::new(&conn)?;
        Ok(Self { conn, root, atoms })
    }

    fn frame_extents(&self, window: Window) -> Result<FrameExtents, WindowSystemError> {
        let prop = self.property(window, self.atoms.net_frame_extents, AtomEnum::CARDINAL, 4)?;
        let values: Vec<u32> = prop.value32().map(|values| values.collect()).unwrap_or_default();
        Ok(FrameExtents::from_cardinals(&values))
    }

    fn property(
        &self,
        window: Window,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
        length: u32,
    ) -> Result<GetPropertyReply, WindowSystemError> {
        Ok(self
            .conn
            .get_property(false, window, property, type_, 0, length)?
            .reply()?)
    }

    fn read_process_comm(pid: u32) -> Option<String> {
        let path = paths::PROC_COMM_FORMAT.replace("{}", &pid.to_string());
        match fs::read_to_string(&path) {
            Ok(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            Err(e) => {
                debug!(pid = pid, error = %e, "Cannot read process name");
                None
            }
        }
    }
}

/// Decoration added by a reparenting window manager, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrameExtents {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

impl FrameExtents {
    /// Parse `_NET_FRAME_EXTENTS` (left, right, top, bottom); anything short means undecorated
    fn from_cardinals(values: &[u32]) -> Self {
        match values {
            [left, right, top, bottom, ..] => Self {
                left: *left as i32,
                right: *right as i32,
                top: *top as i32,
                bottom: *bottom as i32,
            },
            _ => Self::default(),
        }
    }

    /// Grow the client area to the outer frame rectangle
    fn outer_rect(self, client_left: i32, client_top: i32, width: i32, height: i32) -> Rect {
        Rect::new(
            client_left - self.left,
            client_top - self.top,
            client_left + width + self.right,
            client_top + height + self.bottom,
        )
    }

    /// Client size that makes the frame come out at `geometry`'s outer size
    fn client_size(self, geometry: Geometry) -> (u32, u32) {
        let width = geometry.width - self.left - self.right;
        let height = geometry.height - self.top - self.bottom;
        (width.max(1) as u32, height.max(1) as u32)
    }
}

/// Pick the largest _NET_WM_ICON entry not exceeding `max_edge`,
/// falling back to the smallest one available
fn select_icon(data: &[u32], max_edge: u32) -> Option<IconImage> {
    let mut best: Option<(u32, u32, &[u32])> = None;
    let mut idx = 0;

    while idx + 2 <= data.len() {
        let width = data[idx];
        let height = data[idx + 1];
        let pixel_count = (width as usize).saturating_mul(height as usize);
        if width == 0 || height == 0 || idx + 2 + pixel_count > data.len() {
            break;
        }
        let pixels = &data[idx + 2..idx + 2 + pixel_count];

        let edge = width.max(height);
        best = match best {
            None => Some((width, height, pixels)),
            Some((bw, bh, bp)) => {
                let best_edge = bw.max(bh);
                let better = if edge <= max_edge {
                    best_edge > max_edge || edge > best_edge
                } else {
                    best_edge > max_edge && edge < best_edge
                };
                if better {
                    Some((width, height, pixels))
                } else {
                    Some((bw, bh, bp))
                }
            }
        };

        idx += 2 + pixel_count;
    }

    best.map(|(width, height, pixels)| IconImage {
        width,
        height,
        pixels: pixels.to_vec(),
    })
}

impl WindowSystem for X11WindowSystem {
    fn top_level_windows(&self) -> Result<Vec<WindowHandle>, WindowSystemError> {
        let prop = self.property(self.root, self.atoms.net_client_list, AtomEnum::WINDOW, u32::MAX)?;
        let windows = prop
            .value32()
            .ok_or_else(|| WindowSystemError::Other("Invalid return from _NET_CLIENT_LIST".into()))?
            .map(WindowHandle)
            .collect();
        Ok(windows)
    }

    fn is_visible(&self, window: WindowHandle) -> Result<bool, WindowSystemError> {
        let attrs = self.conn.get_window_attributes(window.0)?.reply()?;
        if attrs.map_state != MapState::VIEWABLE {
            return Ok(false);
        }

        let state = self.property(window.0, self.atoms.net_wm_state, AtomEnum::ATOM, x11::TEXT_PROPERTY_LENGTH)?;
        let hidden = state
            .value32()
            .is_some_and(|mut atoms| atoms.any(|atom| atom == self.atoms.net_wm_state_hidden));
        Ok(!hidden)
    }

    fn title(&self, window: WindowHandle) -> Result<String, WindowSystemError> {
        let net_name = self.property(
            window.0,
            self.atoms.net_wm_name,
            self.atoms.utf8_string,
            x11::TEXT_PROPERTY_LENGTH,
        )?;
        if !net_name.value.is_empty() {
            return Ok(String::from_utf8_lossy(&net_name.value).into_owned());
        }

        let name = self.property(window.0, AtomEnum::WM_NAME, AtomEnum::ANY, x11::TEXT_PROPERTY_LENGTH)?;
        Ok(String::from_utf8_lossy(&name.value).into_owned())
    }

    fn class_name(&self, window: WindowHandle) -> Result<String, WindowSystemError> {
        // WM_CLASS is "instance\0class\0"; the class part identifies the application
        let prop = self.property(window.0, AtomEnum::WM_CLASS, AtomEnum::STRING, x11::TEXT_PROPERTY_LENGTH)?;
        let mut parts = prop
            .value
            .split(|&b| b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned());
        let instance = parts.next().unwrap_or_default();
        Ok(parts.next().unwrap_or(instance))
    }

    fn pid(&self, window: WindowHandle) -> Result<Option<u32>, WindowSystemError> {
        let prop = self.property(window.0, self.atoms.net_wm_pid, AtomEnum::CARDINAL, 1)?;
        if prop.value.len() < x11::PID_PROPERTY_SIZE {
            return Ok(None);
        }
        Ok(prop.value32().and_then(|mut values| values.next()))
    }

    fn rect(&self, window: WindowHandle) -> Result<Rect, WindowSystemError> {
        let geometry = self.conn.get_geometry(window.0)?.reply()?;
        let origin = self
            .conn
            .translate_coordinates(window.0, self.root, 0, 0)?
            .reply()?;
        // ConfigureWindow positions the frame, so report the frame too
        let extents = self.frame_extents(window.0)?;
        Ok(extents.outer_rect(
            i32::from(origin.dst_x),
            i32::from(origin.dst_y),
            i32::from(geometry.width),
            i32::from(geometry.height),
        ))
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        Self::read_process_comm(pid)
    }

    fn icon(&self, window: WindowHandle) -> Option<IconImage> {
        let reply = self
            .property(window.0, self.atoms.net_wm_icon, AtomEnum::CARDINAL, x11::ICON_PROPERTY_LENGTH)
            .ok()?;
        if reply.value.is_empty() || reply.format != 32 {
            return None;
        }
        let data: Vec<u32> = reply.value32()?.collect();
        select_icon(&data, x11::MAX_ICON_EDGE)
    }

    #[tracing::instrument(skip(self))]
    fn move_resize(&self, window: WindowHandle, geometry: Geometry) -> Result<(), WindowSystemError> {
        // x/y place the frame corner (NorthWest gravity) but width/height size the client
        let (width, height) = self.frame_extents(window.0)?.client_size(geometry);
        // No stack_mode and no _NET_ACTIVE_WINDOW: stacking order and focus stay untouched
        let aux = ConfigureWindowAux::new()
            .x(geometry.x)
            .y(geometry.y)
            .width(width)
            .height(height);
        self.conn.configure_window(window.0, &aux)?.check()?;
        debug!(window = %window, geometry = %geometry, "ConfigureWindow acknowledged");
        Ok(())
    }
}
