use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use x11rb::protocol::xproto::{
    Atom, ChangeWindowAttributesAux, ConfigureWindowAux, CreateWindowAux, Drawable, EventMask, Gcontext, Pixmap, Visualid,
    Window,
};

use crate::{
    backend::{Announcer, Backend, ClientMessage, Image, Rect},
    Error, Result,
};

pub const ROOT: Window = 0x100;

/// A request recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateWindow(Rect),
    DestroyWindow(Window),
    ChangeAttributes(Window),
    SelectInput { window: Window, mask: u32 },
    ChangeProperty { window: Window, property: Atom },
    CreatePixmap { width: u16, height: u16 },
    FreePixmap(Pixmap),
    CreateGc(Drawable),
    FreeGc(Gcontext),
    GetImage { drawable: Drawable, area: Rect },
    PutImage { drawable: Drawable, width: u16, height: u16 },
    CopyArea { src: Drawable, dst: Drawable, area: Rect },
    FillRectangle(Drawable),
    ClearArea { window: Window, area: Rect },
    Map(Window),
    Unmap(Window),
    Configure { window: Window, x: Option<i32>, y: Option<i32>, width: Option<u32> },
    Restack { window: Window, sibling: Window },
    Reparent { window: Window, parent: Window, x: i16, y: i16 },
    SaveSet(Window),
    SetSelectionOwner { owner: Window, selection: Atom },
    ClientMessage { destination: Window, message: ClientMessage },
    ConfigureNotify { window: Window, geometry: Rect },
    Flush,
}

#[derive(Default)]
struct State {
    next_id: u32,
    atoms: HashMap<String, Atom>,
    calls: Vec<Call>,
    dead: HashSet<Window>,
    failing: HashSet<&'static str>,
    selection_owners: HashMap<Atom, Window>,
    refuse_selection: bool,
    properties: HashMap<(Window, Atom), Vec<u32>>,
    geometries: HashMap<Drawable, Rect>,
}

#[derive(Default)]
pub struct MockAnnouncer {
    messages: Mutex<Vec<ClientMessage>>,
}

impl Announcer for MockAnnouncer {
    fn announce(&self, message: ClientMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// A recording in-memory stand-in for the X server.
pub struct MockBackend {
    state: RefCell<State>,
    announcer: Arc<MockAnnouncer>,
}

impl MockBackend {
    pub fn new() -> Self {
        let state = State { next_id: 0x1000, ..Default::default() };
        let backend = MockBackend { state: RefCell::new(state), announcer: Arc::default() };
        backend.set_geometry(ROOT, Rect::new(0, 0, 1920, 1080));
        backend
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Announcements sent through [`Backend::announcer`], from any thread.
    pub fn announced(&self) -> Vec<ClientMessage> {
        self.announcer.messages.lock().unwrap().clone()
    }

    /// Every later request targeting `window` fails with `BadWindow`.
    pub fn kill_window(&self, window: Window) {
        self.state.borrow_mut().dead.insert(window);
    }

    /// Requests with the given name fail with a generic request error.
    pub fn fail_request(&self, request: &'static str) {
        self.state.borrow_mut().failing.insert(request);
    }

    pub fn set_selection_owner_of(&self, selection: Atom, owner: Window) {
        self.state.borrow_mut().selection_owners.insert(selection, owner);
    }

    /// Selection claims are accepted but never take effect.
    pub fn refuse_selection(&self) {
        self.state.borrow_mut().refuse_selection = true;
    }

    pub fn set_property(&self, window: Window, property: Atom, data: Vec<u32>) {
        self.state.borrow_mut().properties.insert((window, property), data);
    }

    pub fn property(&self, window: Window, property: Atom) -> Option<Vec<u32>> {
        self.state.borrow().properties.get(&(window, property)).cloned()
    }

    pub fn set_geometry(&self, drawable: Drawable, geometry: Rect) {
        self.state.borrow_mut().geometries.insert(drawable, geometry);
    }

    /// Intern `name`, the same way the code under test would.
    pub fn atom(&self, name: &str) -> Atom {
        let mut state = self.state.borrow_mut();
        let next = state.atoms.len() as Atom + 1;
        *state.atoms.entry(name.to_string()).or_insert(next)
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn check(&self, request: &'static str, window: Window) -> Result<()> {
        let state = self.state.borrow();
        if state.failing.contains(request) {
            Err(Error::request(request, "mock failure"))
        } else if state.dead.contains(&window) {
            Err(Error::BadWindow(window))
        } else {
            Ok(())
        }
    }

    fn allocate(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.next_id
    }
}

impl Backend for MockBackend {
    fn root(&self) -> Window {
        ROOT
    }

    fn screen_number(&self) -> usize {
        0
    }

    fn root_visual(&self) -> Visualid {
        0x21
    }

    fn root_depth(&self) -> u8 {
        24
    }

    fn intern_atom(&self, name: &str) -> Result<Atom> {
        Ok(self.atom(name))
    }

    fn create_window(&self, geometry: Rect, _aux: &CreateWindowAux) -> Result<Window> {
        self.check("CreateWindow", ROOT)?;
        let window = self.allocate();
        self.set_geometry(window, geometry);
        self.record(Call::CreateWindow(geometry));
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.check("DestroyWindow", window)?;
        self.record(Call::DestroyWindow(window));
        Ok(())
    }

    fn change_window_attributes(&self, window: Window, _aux: &ChangeWindowAttributesAux) -> Result<()> {
        self.check("ChangeWindowAttributes", window)?;
        self.record(Call::ChangeAttributes(window));
        Ok(())
    }

    fn ensure_event_mask(&self, window: Window, mask: EventMask) -> Result<()> {
        self.check("ChangeWindowAttributes", window)?;
        self.record(Call::SelectInput { window, mask: u32::from(mask) });
        Ok(())
    }

    fn get_geometry(&self, drawable: Drawable) -> Result<Rect> {
        self.check("GetGeometry", drawable)?;
        self.state.borrow().geometries.get(&drawable).copied().ok_or(Error::BadWindow(drawable))
    }

    fn change_property8(&self, window: Window, property: Atom, _type: Atom, _data: &[u8]) -> Result<()> {
        self.check("ChangeProperty", window)?;
        self.record(Call::ChangeProperty { window, property });
        Ok(())
    }

    fn change_property32(&self, window: Window, property: Atom, _type: Atom, data: &[u32]) -> Result<()> {
        self.check("ChangeProperty", window)?;
        self.set_property(window, property, data.to_vec());
        self.record(Call::ChangeProperty { window, property });
        Ok(())
    }

    fn get_property32(&self, window: Window, property: Atom) -> Result<Vec<u32>> {
        self.check("GetProperty", window)?;
        Ok(self.property(window, property).unwrap_or_default())
    }

    fn create_pixmap(&self, _drawable: Drawable, width: u16, height: u16) -> Result<Pixmap> {
        self.check("CreatePixmap", 0)?;
        let pixmap = self.allocate();
        self.set_geometry(pixmap, Rect::new(0, 0, width, height));
        self.record(Call::CreatePixmap { width, height });
        Ok(pixmap)
    }

    fn free_pixmap(&self, pixmap: Pixmap) -> Result<()> {
        self.record(Call::FreePixmap(pixmap));
        Ok(())
    }

    fn create_gc(&self, drawable: Drawable) -> Result<Gcontext> {
        self.check("CreateGC", 0)?;
        self.record(Call::CreateGc(drawable));
        Ok(self.allocate())
    }

    fn free_gc(&self, gc: Gcontext) -> Result<()> {
        self.record(Call::FreeGc(gc));
        Ok(())
    }

    fn get_image(&self, drawable: Drawable, area: Rect) -> Result<Image> {
        self.check("GetImage", drawable)?;
        self.record(Call::GetImage { drawable, area });
        Ok(Image { depth: 24, data: vec![0; area.width as usize * area.height as usize * 4] })
    }

    fn put_image(&self, drawable: Drawable, _gc: Gcontext, width: u16, height: u16, _image: &Image) -> Result<()> {
        self.check("PutImage", drawable)?;
        self.record(Call::PutImage { drawable, width, height });
        Ok(())
    }

    fn copy_area(&self, src: Drawable, dst: Drawable, _gc: Gcontext, area: Rect) -> Result<()> {
        self.check("CopyArea", src)?;
        self.record(Call::CopyArea { src, dst, area });
        Ok(())
    }

    fn fill_rectangle(&self, drawable: Drawable, _gc: Gcontext, _area: Rect) -> Result<()> {
        self.check("PolyFillRectangle", drawable)?;
        self.record(Call::FillRectangle(drawable));
        Ok(())
    }

    fn clear_area(&self, window: Window, area: Rect, _exposures: bool) -> Result<()> {
        self.check("ClearArea", window)?;
        self.record(Call::ClearArea { window, area });
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.check("MapWindow", window)?;
        self.record(Call::Map(window));
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.check("UnmapWindow", window)?;
        self.record(Call::Unmap(window));
        Ok(())
    }

    fn configure_window(&self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        if let Some(sibling) = aux.sibling {
            self.check("Restack", window)?;
            self.record(Call::Restack { window, sibling });
            return Ok(());
        }
        self.check("ConfigureWindow", window)?;
        self.record(Call::Configure { window, x: aux.x, y: aux.y, width: aux.width });
        Ok(())
    }

    fn reparent_window(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<()> {
        self.check("ReparentWindow", window)?;
        self.record(Call::Reparent { window, parent, x, y });
        Ok(())
    }

    fn add_to_save_set(&self, window: Window) -> Result<()> {
        self.check("ChangeSaveSet", window)?;
        self.record(Call::SaveSet(window));
        Ok(())
    }

    fn get_selection_owner(&self, selection: Atom) -> Result<Window> {
        self.check("GetSelectionOwner", 0)?;
        Ok(self.state.borrow().selection_owners.get(&selection).copied().unwrap_or(x11rb::NONE))
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<()> {
        self.check("SetSelectionOwner", 0)?;
        self.record(Call::SetSelectionOwner { owner, selection });
        let mut state = self.state.borrow_mut();
        if !state.refuse_selection {
            state.selection_owners.insert(selection, owner);
        }
        Ok(())
    }

    fn send_client_message(&self, destination: Window, _mask: EventMask, message: ClientMessage) -> Result<()> {
        self.check("SendEvent", destination)?;
        self.record(Call::ClientMessage { destination, message });
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, geometry: Rect) -> Result<()> {
        self.check("SendEvent", window)?;
        self.record(Call::ConfigureNotify { window, geometry });
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.record(Call::Flush);
        Ok(())
    }

    fn announcer(&self) -> Arc<dyn Announcer> {
        self.announcer.clone()
    }
}
