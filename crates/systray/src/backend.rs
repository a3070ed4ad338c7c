use std::sync::Arc;

use derive_more::Display;
use x11rb::protocol::xproto::{
    Atom, ChangeWindowAttributesAux, ConfigureWindowAux, CreateWindowAux, Drawable, EventMask, Gcontext, Pixmap, Visualid,
    Window,
};

use crate::Result;

/// A rectangle in X11 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display("{width}x{height}+{x}+{y}")]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Rect { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Z-pixmap image data read back from a drawable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub depth: u8,
    pub data: Vec<u8>,
}

/// A format 32 client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessage {
    pub window: Window,
    pub type_: Atom,
    pub data: [u32; 5],
}

/// Sends manager announcements from outside the event loop thread.
pub trait Announcer: Send + Sync {
    fn announce(&self, message: ClientMessage) -> Result<()>;
}

/// The subset of the X11 protocol the tray manager needs.
///
/// Every request is checked: it returns once the server confirmed it or reported an error.
/// Errors caused by a window that does not exist are reported as [`crate::Error::BadWindow`].
pub trait Backend {
    fn root(&self) -> Window;
    fn screen_number(&self) -> usize;
    fn root_visual(&self) -> Visualid;
    fn root_depth(&self) -> u8;

    fn intern_atom(&self, name: &str) -> Result<Atom>;

    fn create_window(&self, geometry: Rect, aux: &CreateWindowAux) -> Result<Window>;
    fn destroy_window(&self, window: Window) -> Result<()>;
    fn change_window_attributes(&self, window: Window, aux: &ChangeWindowAttributesAux) -> Result<()>;
    /// Add `mask` to the events this client selected on `window`, keeping the existing ones.
    fn ensure_event_mask(&self, window: Window, mask: EventMask) -> Result<()>;
    fn get_geometry(&self, drawable: Drawable) -> Result<Rect>;

    fn change_property8(&self, window: Window, property: Atom, type_: Atom, data: &[u8]) -> Result<()>;
    fn change_property32(&self, window: Window, property: Atom, type_: Atom, data: &[u32]) -> Result<()>;
    /// Read a 32 bit property. A missing property yields an empty vector.
    fn get_property32(&self, window: Window, property: Atom) -> Result<Vec<u32>>;

    fn create_pixmap(&self, drawable: Drawable, width: u16, height: u16) -> Result<Pixmap>;
    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()>;
    fn create_gc(&self, drawable: Drawable) -> Result<Gcontext>;
    fn free_gc(&self, gc: Gcontext) -> Result<()>;
    fn get_image(&self, drawable: Drawable, area: Rect) -> Result<Image>;
    fn put_image(&self, drawable: Drawable, gc: Gcontext, width: u16, height: u16, image: &Image) -> Result<()>;
    /// Copy `area` of `src` to the origin of `dst`.
    fn copy_area(&self, src: Drawable, dst: Drawable, gc: Gcontext, area: Rect) -> Result<()>;
    fn fill_rectangle(&self, drawable: Drawable, gc: Gcontext, area: Rect) -> Result<()>;
    fn clear_area(&self, window: Window, area: Rect, exposures: bool) -> Result<()>;

    fn map_window(&self, window: Window) -> Result<()>;
    fn unmap_window(&self, window: Window) -> Result<()>;
    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()>;
    fn reparent_window(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<()>;
    fn add_to_save_set(&self, window: Window) -> Result<()>;

    fn get_selection_owner(&self, selection: Atom) -> Result<Window>;
    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<()>;

    fn send_client_message(&self, destination: Window, mask: EventMask, message: ClientMessage) -> Result<()>;
    /// Send a synthetic ConfigureNotify telling `window` its geometry.
    fn send_configure_notify(&self, window: Window, geometry: Rect) -> Result<()>;

    fn flush(&self) -> Result<()>;

    fn announcer(&self) -> Arc<dyn Announcer>;
}
