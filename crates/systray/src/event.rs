use x11rb::protocol::{
    xproto::{Atom, Property, Window},
    Event,
};

/// The protocol events the tray manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    Expose { window: Window, count: u16 },
    VisibilityNotify { window: Window },
    ClientMessage { window: Window, type_: Atom, format: u8, data: [u32; 5] },
    ConfigureRequest { window: Window },
    ResizeRequest { window: Window },
    SelectionClear { owner: Window, selection: Atom },
    PropertyNotify { window: Window, atom: Atom, deleted: bool },
    ReparentNotify { window: Window, parent: Window },
    DestroyNotify { window: Window },
    MapNotify { window: Window },
    UnmapNotify { window: Window },
}

impl TrayEvent {
    /// Convert an x11rb event, `None` for events the tray does not care about.
    pub fn from_x11(event: &Event) -> Option<Self> {
        Some(match event {
            Event::Expose(e) => TrayEvent::Expose { window: e.window, count: e.count },
            Event::VisibilityNotify(e) => TrayEvent::VisibilityNotify { window: e.window },
            Event::ClientMessage(e) => {
                TrayEvent::ClientMessage { window: e.window, type_: e.type_, format: e.format, data: e.data.as_data32() }
            }
            Event::ConfigureRequest(e) => TrayEvent::ConfigureRequest { window: e.window },
            Event::ResizeRequest(e) => TrayEvent::ResizeRequest { window: e.window },
            Event::SelectionClear(e) => TrayEvent::SelectionClear { owner: e.owner, selection: e.selection },
            Event::PropertyNotify(e) => {
                TrayEvent::PropertyNotify { window: e.window, atom: e.atom, deleted: e.state == Property::DELETE }
            }
            Event::ReparentNotify(e) => TrayEvent::ReparentNotify { window: e.window, parent: e.parent },
            Event::DestroyNotify(e) => TrayEvent::DestroyNotify { window: e.window },
            Event::MapNotify(e) => TrayEvent::MapNotify { window: e.window },
            Event::UnmapNotify(e) => TrayEvent::UnmapNotify { window: e.window },
            _ => return None,
        })
    }
}
