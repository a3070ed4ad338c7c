use x11rb::protocol::xproto::{
    AtomEnum, BackingStore, ChangeWindowAttributesAux, ConfigureWindowAux, CreateWindowAux, EventMask, Gcontext, Pixmap,
    StackMode, Window,
};

use crate::{
    backend::Backend,
    embed::{self, Atoms},
    settings::TraySettings,
    Rect, Result, Rgba,
};

const TRAY_WM_NAME: &str = "Traybar tray window";
const TRAY_WM_CLASS: &[u8] = b"tray\0Traybar\0";

/// The window icons are embedded into, plus the resources used to paint its background.
#[derive(Debug, Default)]
pub struct Container {
    window: Window,
    pixmap: Pixmap,
    gc: Gcontext,
    mapped: bool,
    restacked: bool,
    /// The host bar is currently not visible.
    hidden: bool,
}

impl Container {
    pub fn window(&self) -> Window {
        self.window
    }

    pub fn exists(&self) -> bool {
        self.window != x11rb::NONE
    }

    pub fn pixmap(&self) -> Pixmap {
        self.pixmap
    }

    pub fn gc(&self) -> Gcontext {
        self.gc
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn set_mapped(&mut self, mapped: bool) {
        self.mapped = mapped;
    }

    pub fn is_restacked(&self) -> bool {
        self.restacked
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn create_window(&mut self, backend: &dyn Backend, atoms: &Atoms, settings: &TraySettings, geometry: Rect) -> Result<Window> {
        log::trace!("tray: Create tray window");
        let mut aux = CreateWindowAux::new()
            .backing_store(BackingStore::WHEN_MAPPED)
            .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::STRUCTURE_NOTIFY | EventMask::EXPOSURE)
            .override_redirect(1);
        if !settings.transparent {
            aux = aux.background_pixel(settings.background.0).border_pixel(settings.background.0);
        }
        self.window = backend.create_window(geometry, &aux)?;
        log::info!("Tray window: {:#x}", self.window);

        // keep compositors from drawing a shadow around the tray
        if let Err(err) = backend.change_property32(self.window, atoms._COMPTON_SHADOW, AtomEnum::CARDINAL.into(), &[0]) {
            log::warn!("Failed to exclude tray window from shadows ({})", err);
        }
        Ok(self.window)
    }

    /// Allocate the pixmap backing a transparent container. A no-op for opaque trays.
    pub fn create_background(&mut self, backend: &dyn Backend, settings: &TraySettings) -> Result<()> {
        if !settings.transparent || (self.pixmap != x11rb::NONE && self.gc != x11rb::NONE) {
            return Ok(());
        }
        if self.pixmap == x11rb::NONE {
            self.pixmap = backend.create_pixmap(self.window, settings.width_max, settings.height_fill)?;
        }
        if self.gc == x11rb::NONE {
            self.gc = backend.create_gc(self.pixmap)?;
        }
        let aux = ChangeWindowAttributesAux::new().background_pixmap(self.pixmap);
        if let Err(err) = backend.change_window_attributes(self.window, &aux) {
            log::error!("Failed to set tray window back pixmap ({})", err);
        }
        Ok(())
    }

    /// Put the container right above `sibling` in the stacking order.
    pub fn restack(&mut self, backend: &dyn Backend, sibling: Window) -> bool {
        if sibling == x11rb::NONE {
            return false;
        }
        log::trace!("tray: Restacking tray window");
        let aux = ConfigureWindowAux::new().sibling(sibling).stack_mode(StackMode::ABOVE);
        match backend.configure_window(self.window, &aux) {
            Ok(()) => self.restacked = true,
            Err(err) => log::trace!("tray: Failed to put tray above {:#x} in the stack ({})", sibling, err),
        }
        self.restacked
    }

    pub fn set_hints(&self, backend: &dyn Backend, atoms: &Atoms) -> Result<()> {
        let window = self.window;
        log::trace!("tray: Set window WM_NAME / WM_CLASS");
        backend.change_property8(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into(), TRAY_WM_NAME.as_bytes())?;
        backend.change_property8(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into(), TRAY_WM_CLASS)?;

        log::trace!("tray: Set window WM_PROTOCOLS");
        backend.change_property32(window, atoms.WM_PROTOCOLS, AtomEnum::ATOM.into(), &[
            atoms.WM_DELETE_WINDOW,
            atoms.WM_TAKE_FOCUS,
        ])?;

        log::trace!("tray: Set window _NET_WM_WINDOW_TYPE");
        backend.change_property32(window, atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM.into(), &[
            atoms._NET_WM_WINDOW_TYPE_DOCK,
            atoms._NET_WM_WINDOW_TYPE_NORMAL,
        ])?;

        log::trace!("tray: Set window _NET_WM_STATE");
        backend.change_property32(window, atoms._NET_WM_STATE, AtomEnum::ATOM.into(), &[atoms._NET_WM_STATE_SKIP_TASKBAR])?;

        log::trace!("tray: Set window _NET_WM_PID");
        backend.change_property32(window, atoms._NET_WM_PID, AtomEnum::CARDINAL.into(), &[std::process::id()])?;

        log::trace!("tray: Set window _NET_SYSTEM_TRAY_VISUAL");
        backend.change_property32(window, atoms._NET_SYSTEM_TRAY_VISUAL, AtomEnum::VISUALID.into(), &[backend.root_visual()])?;

        log::trace!("tray: Set window _NET_SYSTEM_TRAY_ORIENTATION");
        backend.change_property32(window, atoms._NET_SYSTEM_TRAY_ORIENTATION, AtomEnum::CARDINAL.into(), &[
            embed::NET_SYSTEM_TRAY_ORIENTATION_HORZ,
        ])
    }

    /// Publish the background color so clients can pick a fitting icon theme.
    pub fn set_color_hint(&self, backend: &dyn Backend, atoms: &Atoms, background: Rgba) -> Result<()> {
        log::trace!("tray: Set _NET_SYSTEM_TRAY_COLORS to {}", background);
        // 16 bit per channel, same color for normal, error, warning and success
        let rgb = [background.red(), background.green(), background.blue()].map(|c| c as u32 * 0x101);
        let colors: Vec<u32> = rgb.iter().copied().cycle().take(12).collect();
        backend.change_property32(self.window, atoms._NET_SYSTEM_TRAY_COLORS, AtomEnum::CARDINAL.into(), &colors)
    }

    /// Destroy the window and free the background resources, ignoring errors.
    pub fn destroy(&mut self, backend: &dyn Backend) {
        if self.window != x11rb::NONE {
            log::trace!("tray: Destroy window");
            if let Err(err) = backend.destroy_window(self.window) {
                log::debug!("Failed to destroy tray window ({})", err);
            }
        }
        if self.pixmap != x11rb::NONE {
            if let Err(err) = backend.free_pixmap(self.pixmap) {
                log::debug!("Failed to free tray pixmap ({})", err);
            }
        }
        if self.gc != x11rb::NONE {
            if let Err(err) = backend.free_gc(self.gc) {
                log::debug!("Failed to free tray gc ({})", err);
            }
        }
        *self = Container { hidden: self.hidden, ..Default::default() };
    }

    /// Drop the window id without destroying it, e.g. when it already is gone.
    pub fn forget_window(&mut self) {
        self.window = x11rb::NONE;
    }
}
