//! The XEmbed / system tray protocol: protocol constants, the atom table and the docking
//! handshake that turns a foreign top-level window into a tray icon.

use x11rb::protocol::xproto::{Atom, ChangeWindowAttributesAux, EventMask, Window};

use crate::{
    backend::{Backend, ClientMessage},
    client::{ClientRegistry, EmbedInfo},
    layout,
    settings::TraySettings,
    Error, Result,
};

pub const SYSTEM_TRAY_REQUEST_DOCK: u32 = 0;
pub const SYSTEM_TRAY_BEGIN_MESSAGE: u32 = 1;
pub const SYSTEM_TRAY_CANCEL_MESSAGE: u32 = 2;

pub const NET_SYSTEM_TRAY_ORIENTATION_HORZ: u32 = 0;

/// Highest XEmbed protocol version this manager speaks.
pub const XEMBED_VERSION: u32 = 0;
pub const XEMBED_EMBEDDED_NOTIFY: u32 = 0;

/// `ParentRelative` background, see the core protocol's CreateWindow.
const BACK_PIXMAP_PARENT_RELATIVE: u32 = 1;

macro_rules! protocol_atoms {
    ($vis:vis struct $name:ident { $($atom:ident),* $(,)? }) => {
        #[allow(non_snake_case)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis struct $name {
            $(pub $atom: Atom,)*
        }

        impl $name {
            pub const NAMES: &'static [&'static str] = &[$(stringify!($atom)),*];

            pub fn intern(backend: &dyn Backend) -> Result<Self> {
                Ok($name { $($atom: backend.intern_atom(stringify!($atom))?,)* })
            }
        }
    };
}

protocol_atoms! {
    pub struct Atoms {
        MANAGER,
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        _NET_WM_PID,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_STATE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_SYSTEM_TRAY_OPCODE,
        _NET_SYSTEM_TRAY_ORIENTATION,
        _NET_SYSTEM_TRAY_VISUAL,
        _NET_SYSTEM_TRAY_COLORS,
        _XEMBED,
        _XEMBED_INFO,
        _XROOTPMAP_ID,
        _XSETROOT_ID,
        ESETROOT_PMAP_ID,
        _COMPTON_SHADOW,
    }
}

impl Atoms {
    /// Properties on the root window that change whenever the desktop background changes.
    pub fn is_root_background(&self, atom: Atom) -> bool {
        atom == self._XROOTPMAP_ID || atom == self._XSETROOT_ID || atom == self.ESETROOT_PMAP_ID
    }
}

pub fn selection_atom_name(screen: usize) -> String {
    format!("_NET_SYSTEM_TRAY_S{}", screen)
}

pub fn query_info(backend: &dyn Backend, atoms: &Atoms, window: Window) -> Result<EmbedInfo> {
    let data = backend.get_property32(window, atoms._XEMBED_INFO)?;
    EmbedInfo::from_property(&data).ok_or(Error::InvalidEmbedInfo(window))
}

pub fn notify_embedded(backend: &dyn Backend, atoms: &Atoms, window: Window, embedder: Window, version: u32) -> Result<()> {
    let message = ClientMessage {
        window,
        type_: atoms._XEMBED,
        data: [x11rb::CURRENT_TIME, XEMBED_EMBEDDED_NOTIFY, 0, embedder, version],
    };
    backend.send_client_message(window, EventMask::NO_EVENT, message)
}

/// Hand a client window back to the root window.
pub fn unembed(backend: &dyn Backend, window: Window) -> Result<()> {
    backend.unmap_window(window)?;
    backend.reparent_window(window, backend.root(), 0, 0)
}

#[derive(Debug)]
pub enum DockOutcome {
    /// The window already is a tray client, nothing was done.
    AlreadyEmbedded,
    Embedded { mapped: bool },
    /// The handshake failed and the client was removed again.
    Evicted(Error),
}

/// Run the docking handshake for `window`.
///
/// The registry entry is created before the first request so re-entrant dock requests for the
/// same window are rejected. Window errors during the handshake evict the client again; they
/// never affect the rest of the tray.
pub fn process_docking_request(
    backend: &dyn Backend,
    atoms: &Atoms,
    settings: &TraySettings,
    container: Window,
    clients: &mut ClientRegistry,
    window: Window,
) -> DockOutcome {
    if clients.is_embedded(window) {
        log::warn!("Tray client {:#x} already embedded, ignoring request...", window);
        return DockOutcome::AlreadyEmbedded;
    }
    log::info!("Processing docking request from {:#x}", window);

    clients.add(window, settings.width, settings.height);

    log::trace!("tray: Get client _XEMBED_INFO");
    match query_info(backend, atoms, window) {
        Ok(info) => {
            if let Some(client) = clients.find_mut(window) {
                client.set_info(info);
            }
        }
        Err(err) if err.is_window_error() => {
            log::error!("Failed to query for _XEMBED_INFO, removing client... ({})", err);
            clients.remove(window);
            return DockOutcome::Evicted(err);
        }
        Err(err) => log::error!("{}", err),
    }

    match embed_client(backend, atoms, settings, container, clients, window) {
        Ok(mapped) => DockOutcome::Embedded { mapped },
        Err(err) => {
            log::error!("Failed to setup tray client, removing... ({})", err);
            clients.remove(window);
            DockOutcome::Evicted(err)
        }
    }
}

fn embed_client(
    backend: &dyn Backend,
    atoms: &Atoms,
    settings: &TraySettings,
    container: Window,
    clients: &mut ClientRegistry,
    window: Window,
) -> Result<bool> {
    let x = layout::client_x(settings, clients.slot_of(window).unwrap_or(0));
    let y = layout::client_y(settings);
    let client = clients.find_mut(window).ok_or(Error::BadWindow(window))?;

    log::trace!("tray: Update client window");
    let aux = ChangeWindowAttributesAux::new()
        .background_pixmap(BACK_PIXMAP_PARENT_RELATIVE)
        .event_mask(EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY);
    backend.change_window_attributes(window, &aux)?;

    log::trace!("tray: Configure client size");
    client.reconfigure(backend, 0, 0)?;

    log::trace!("tray: Add client window to the save set");
    backend.add_to_save_set(window)?;

    log::trace!("tray: Reparent client");
    backend.reparent_window(window, container, x, y)?;

    log::trace!("tray: Send embbeded notification to client");
    let info = client.info();
    notify_embedded(backend, atoms, window, container, info.version.min(XEMBED_VERSION))?;

    if info.wants_mapped() {
        log::trace!("tray: Map client");
        backend.map_window(window)?;
    }
    Ok(info.wants_mapped())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        client::XEMBED_MAPPED,
        testing::{Call, MockBackend},
    };
    use pretty_assertions::assert_eq;

    const CONTAINER: Window = 0x500;

    fn settings() -> TraySettings {
        TraySettings { width: 16, height: 16, height_fill: 20, spacing: 2, ..Default::default() }
    }

    #[test]
    fn test_atom_table_is_complete() {
        let backend = MockBackend::new();
        let atoms = Atoms::intern(&backend).unwrap();
        assert_eq!(20, Atoms::NAMES.len());
        assert_eq!(backend.atom("_XEMBED_INFO"), atoms._XEMBED_INFO);
        assert!(atoms.is_root_background(backend.atom("ESETROOT_PMAP_ID")));
        assert!(!atoms.is_root_background(atoms._XEMBED_INFO));
        assert_eq!("_NET_SYSTEM_TRAY_S1", selection_atom_name(1));
    }

    #[test]
    fn test_dock_handshake() {
        let backend = MockBackend::new();
        let atoms = Atoms::intern(&backend).unwrap();
        backend.set_property(0x42, atoms._XEMBED_INFO, vec![0, XEMBED_MAPPED]);
        let mut clients = ClientRegistry::default();

        let outcome = process_docking_request(&backend, &atoms, &settings(), CONTAINER, &mut clients, 0x42);
        assert!(matches!(outcome, DockOutcome::Embedded { mapped: true }));
        assert!(clients.is_embedded(0x42));

        let calls = backend.calls();
        assert!(calls.contains(&Call::SaveSet(0x42)));
        assert!(calls.contains(&Call::Reparent { window: 0x42, parent: CONTAINER, x: 2, y: 2 }));
        assert!(calls.contains(&Call::Map(0x42)));
        assert!(calls.iter().any(|call| matches!(
            call,
            Call::ClientMessage { destination: 0x42, message } if message.type_ == atoms._XEMBED && message.data[3] == CONTAINER
        )));
    }

    #[test]
    fn test_missing_info_still_embeds_unmapped() {
        let backend = MockBackend::new();
        let atoms = Atoms::intern(&backend).unwrap();
        let mut clients = ClientRegistry::default();

        let outcome = process_docking_request(&backend, &atoms, &settings(), CONTAINER, &mut clients, 0x42);
        assert!(matches!(outcome, DockOutcome::Embedded { mapped: false }));
        assert!(!backend.calls().contains(&Call::Map(0x42)));
    }

    #[test]
    fn test_vanished_window_is_evicted() {
        let backend = MockBackend::new();
        let atoms = Atoms::intern(&backend).unwrap();
        backend.kill_window(0x42);
        let mut clients = ClientRegistry::default();

        let outcome = process_docking_request(&backend, &atoms, &settings(), CONTAINER, &mut clients, 0x42);
        assert!(matches!(outcome, DockOutcome::Evicted(Error::BadWindow(0x42))));
        assert!(clients.is_empty());
    }

    #[test]
    fn test_duplicate_request_is_ignored() {
        let backend = MockBackend::new();
        let atoms = Atoms::intern(&backend).unwrap();
        let mut clients = ClientRegistry::default();
        process_docking_request(&backend, &atoms, &settings(), CONTAINER, &mut clients, 0x42);
        backend.clear_calls();

        let outcome = process_docking_request(&backend, &atoms, &settings(), CONTAINER, &mut clients, 0x42);
        assert!(matches!(outcome, DockOutcome::AlreadyEmbedded));
        assert_eq!(1, clients.len());
        assert!(backend.calls().is_empty());
    }
}
