use std::sync::Arc;

use x11rb::{
    connection::{Connection, RequestConnection},
    cookie::VoidCookie,
    errors::{ConnectionError, ReplyError, ReplyOrIdError},
    protocol::{xproto::*, ErrorKind},
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    CURRENT_TIME,
};

use crate::{
    backend::{Announcer, Backend, ClientMessage, Image, Rect},
    Error, Result,
};

/// [`Backend`] on top of an x11rb connection shared with the host bar.
pub struct X11Backend {
    conn: Arc<RustConnection>,
    screen_num: usize,
}

impl X11Backend {
    pub fn new(conn: Arc<RustConnection>, screen_num: usize) -> Self {
        X11Backend { conn, screen_num }
    }

    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        Ok(X11Backend::new(Arc::new(conn), screen_num))
    }

    pub fn connection(&self) -> &Arc<RustConnection> {
        &self.conn
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }
}

fn reply_error(request: &'static str, err: ReplyError) -> Error {
    match err {
        ReplyError::ConnectionError(e) => Error::Connection(e),
        ReplyError::X11Error(e) if e.error_kind == ErrorKind::Window => Error::BadWindow(e.bad_value),
        ReplyError::X11Error(e) => Error::request(request, format!("{:?} (bad value {:#x})", e.error_kind, e.bad_value)),
    }
}

fn id_error(err: ReplyOrIdError) -> Error {
    match err {
        ReplyOrIdError::ConnectionError(e) => Error::Connection(e),
        ReplyOrIdError::X11Error(e) => Error::request("GenerateId", format!("{:?}", e.error_kind)),
        ReplyOrIdError::IdsExhausted => Error::request("GenerateId", "X11 ids exhausted"),
    }
}

fn checked<C: RequestConnection>(request: &'static str, cookie: std::result::Result<VoidCookie<'_, C>, ConnectionError>) -> Result<()> {
    cookie?.check().map_err(|e| reply_error(request, e))
}

impl Backend for X11Backend {
    fn root(&self) -> Window {
        self.screen().root
    }

    fn screen_number(&self) -> usize {
        self.screen_num
    }

    fn root_visual(&self) -> Visualid {
        self.screen().root_visual
    }

    fn root_depth(&self) -> u8 {
        self.screen().root_depth
    }

    fn intern_atom(&self, name: &str) -> Result<Atom> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply().map_err(|e| reply_error("InternAtom", e))?.atom)
    }

    fn create_window(&self, geometry: Rect, aux: &CreateWindowAux) -> Result<Window> {
        let window = self.conn.generate_id().map_err(id_error)?;
        checked(
            "CreateWindow",
            self.conn.create_window(
                self.root_depth(),
                window,
                self.root(),
                geometry.x,
                geometry.y,
                geometry.width.max(1),
                geometry.height.max(1),
                0,
                WindowClass::INPUT_OUTPUT,
                self.root_visual(),
                aux,
            ),
        )?;
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        checked("DestroyWindow", self.conn.destroy_window(window))
    }

    fn change_window_attributes(&self, window: Window, aux: &ChangeWindowAttributesAux) -> Result<()> {
        checked("ChangeWindowAttributes", self.conn.change_window_attributes(window, aux))
    }

    fn ensure_event_mask(&self, window: Window, mask: EventMask) -> Result<()> {
        let attributes =
            self.conn.get_window_attributes(window)?.reply().map_err(|e| reply_error("GetWindowAttributes", e))?;
        let aux = ChangeWindowAttributesAux::new().event_mask(attributes.your_event_mask | mask);
        self.change_window_attributes(window, &aux)
    }

    fn get_geometry(&self, drawable: Drawable) -> Result<Rect> {
        let geometry = self.conn.get_geometry(drawable)?.reply().map_err(|e| reply_error("GetGeometry", e))?;
        Ok(Rect::new(geometry.x, geometry.y, geometry.width, geometry.height))
    }

    fn change_property8(&self, window: Window, property: Atom, type_: Atom, data: &[u8]) -> Result<()> {
        checked("ChangeProperty", self.conn.change_property8(PropMode::REPLACE, window, property, type_, data))
    }

    fn change_property32(&self, window: Window, property: Atom, type_: Atom, data: &[u32]) -> Result<()> {
        checked("ChangeProperty", self.conn.change_property32(PropMode::REPLACE, window, property, type_, data))
    }

    fn get_property32(&self, window: Window, property: Atom) -> Result<Vec<u32>> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, 32)?
            .reply()
            .map_err(|e| reply_error("GetProperty", e))?;
        Ok(reply.value32().map(|values| values.collect()).unwrap_or_default())
    }

    fn create_pixmap(&self, drawable: Drawable, width: u16, height: u16) -> Result<Pixmap> {
        let pixmap = self.conn.generate_id().map_err(id_error)?;
        checked("CreatePixmap", self.conn.create_pixmap(self.root_depth(), pixmap, drawable, width.max(1), height.max(1)))?;
        Ok(pixmap)
    }

    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()> {
        checked("FreePixmap", self.conn.free_pixmap(pixmap))
    }

    fn create_gc(&self, drawable: Drawable) -> Result<Gcontext> {
        let gc = self.conn.generate_id().map_err(id_error)?;
        checked("CreateGC", self.conn.create_gc(gc, drawable, &CreateGCAux::new().graphics_exposures(0)))?;
        Ok(gc)
    }

    fn free_gc(&self, gc: Gcontext) -> Result<()> {
        checked("FreeGC", self.conn.free_gc(gc))
    }

    fn get_image(&self, drawable: Drawable, area: Rect) -> Result<Image> {
        let reply = self
            .conn
            .get_image(ImageFormat::Z_PIXMAP, drawable, area.x, area.y, area.width, area.height, !0)?
            .reply()
            .map_err(|e| reply_error("GetImage", e))?;
        Ok(Image { depth: reply.depth, data: reply.data })
    }

    fn put_image(&self, drawable: Drawable, gc: Gcontext, width: u16, height: u16, image: &Image) -> Result<()> {
        checked(
            "PutImage",
            self.conn.put_image(ImageFormat::Z_PIXMAP, drawable, gc, width, height, 0, 0, 0, image.depth, &image.data),
        )
    }

    fn copy_area(&self, src: Drawable, dst: Drawable, gc: Gcontext, area: Rect) -> Result<()> {
        checked("CopyArea", self.conn.copy_area(src, dst, gc, area.x, area.y, 0, 0, area.width, area.height))
    }

    fn fill_rectangle(&self, drawable: Drawable, gc: Gcontext, area: Rect) -> Result<()> {
        let rectangle = Rectangle { x: area.x, y: area.y, width: area.width, height: area.height };
        checked("PolyFillRectangle", self.conn.poly_fill_rectangle(drawable, gc, &[rectangle]))
    }

    fn clear_area(&self, window: Window, area: Rect, exposures: bool) -> Result<()> {
        checked("ClearArea", self.conn.clear_area(exposures, window, area.x, area.y, area.width, area.height))
    }

    fn map_window(&self, window: Window) -> Result<()> {
        checked("MapWindow", self.conn.map_window(window))
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        checked("UnmapWindow", self.conn.unmap_window(window))
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        checked("ConfigureWindow", self.conn.configure_window(window, aux))
    }

    fn reparent_window(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<()> {
        checked("ReparentWindow", self.conn.reparent_window(window, parent, x, y))
    }

    fn add_to_save_set(&self, window: Window) -> Result<()> {
        checked("ChangeSaveSet", self.conn.change_save_set(SetMode::INSERT, window))
    }

    fn get_selection_owner(&self, selection: Atom) -> Result<Window> {
        Ok(self.conn.get_selection_owner(selection)?.reply().map_err(|e| reply_error("GetSelectionOwner", e))?.owner)
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<()> {
        checked("SetSelectionOwner", self.conn.set_selection_owner(owner, selection, CURRENT_TIME))
    }

    fn send_client_message(&self, destination: Window, mask: EventMask, message: ClientMessage) -> Result<()> {
        let event = ClientMessageEvent::new(32, message.window, message.type_, message.data);
        checked("SendEvent", self.conn.send_event(false, destination, mask, event))
    }

    fn send_configure_notify(&self, window: Window, geometry: Rect) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            border_width: 0,
            override_redirect: false,
        };
        checked("SendEvent", self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event))
    }

    fn flush(&self) -> Result<()> {
        Ok(self.conn.flush()?)
    }

    fn announcer(&self) -> Arc<dyn Announcer> {
        Arc::new(X11Announcer { conn: self.conn.clone(), root: self.root() })
    }
}

/// Broadcasts to the root window over the shared connection; safe to move to another thread.
struct X11Announcer {
    conn: Arc<RustConnection>,
    root: Window,
}

impl Announcer for X11Announcer {
    fn announce(&self, message: ClientMessage) -> Result<()> {
        let event = ClientMessageEvent::new(32, message.window, message.type_, message.data);
        checked("SendEvent", self.conn.send_event(false, self.root, EventMask::STRUCTURE_NOTIFY, event))?;
        Ok(self.conn.flush()?)
    }
}
