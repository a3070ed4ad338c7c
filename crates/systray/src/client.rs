use itertools::Itertools;
use x11rb::protocol::xproto::{ConfigureWindowAux, Window};

use crate::{
    backend::{Backend, Rect},
    Result,
};

/// Set in the `_XEMBED_INFO` flags when the client wants to be mapped.
pub const XEMBED_MAPPED: u32 = 1 << 0;

/// Contents of a client's `_XEMBED_INFO` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbedInfo {
    pub version: u32,
    pub flags: u32,
}

impl EmbedInfo {
    pub fn from_property(data: &[u32]) -> Option<Self> {
        match data {
            [version, flags, ..] => Some(EmbedInfo { version: *version, flags: *flags }),
            _ => None,
        }
    }

    pub fn wants_mapped(&self) -> bool {
        self.flags & XEMBED_MAPPED == XEMBED_MAPPED
    }
}

/// An icon window embedded into the tray container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayClient {
    window: Window,
    info: EmbedInfo,
    mapped: bool,
    width: u16,
    height: u16,
    geometry: Option<Rect>,
}

impl TrayClient {
    pub fn new(window: Window, width: u16, height: u16) -> Self {
        TrayClient { window, info: EmbedInfo::default(), mapped: false, width, height, geometry: None }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn matches(&self, window: Window) -> bool {
        self.window == window
    }

    pub fn info(&self) -> EmbedInfo {
        self.info
    }

    pub fn set_info(&mut self, info: EmbedInfo) {
        self.info = info;
    }

    pub fn mapped(&self) -> bool {
        self.mapped
    }

    pub fn set_mapped(&mut self, mapped: bool) {
        self.mapped = mapped;
    }

    /// Last geometry applied with [`TrayClient::reconfigure`].
    pub fn geometry(&self) -> Option<Rect> {
        self.geometry
    }

    /// Whether the client takes up a slot in the container.
    pub fn occupies_slot(&self) -> bool {
        self.mapped || self.info.wants_mapped()
    }

    /// Map or unmap the window to match what the client asked for in `_XEMBED_INFO`.
    pub fn ensure_state(&self, backend: &dyn Backend) -> Result<()> {
        if !self.mapped && self.info.wants_mapped() {
            backend.map_window(self.window)
        } else if self.mapped && !self.info.wants_mapped() {
            backend.unmap_window(self.window)
        } else {
            Ok(())
        }
    }

    /// Move and resize the window into its slot. Returns `false` when it already was there.
    pub fn reconfigure(&mut self, backend: &dyn Backend, x: i16, y: i16) -> Result<bool> {
        let geometry = Rect::new(x, y, self.width, self.height);
        if self.geometry == Some(geometry) {
            return Ok(false);
        }
        let aux = ConfigureWindowAux::new()
            .x(x as i32)
            .y(y as i32)
            .width(self.width as u32)
            .height(self.height as u32);
        backend.configure_window(self.window, &aux)?;
        self.geometry = Some(geometry);
        Ok(true)
    }

    /// Tell the client where it is, without moving it.
    pub fn configure_notify(&self, backend: &dyn Backend, x: i16, y: i16) -> Result<()> {
        backend.send_configure_notify(self.window, Rect::new(x, y, self.width, self.height))
    }

    pub fn clear_window(&self, backend: &dyn Backend) -> Result<()> {
        backend.clear_area(self.window, Rect::new(0, 0, self.width, self.height), true)
    }
}

/// The embedded clients in docking order.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Vec<TrayClient>,
}

impl ClientRegistry {
    pub fn add(&mut self, window: Window, width: u16, height: u16) -> &mut TrayClient {
        self.clients.retain(|client| !client.matches(window));
        self.clients.push(TrayClient::new(window, width, height));
        let index = self.clients.len() - 1;
        &mut self.clients[index]
    }

    pub fn find(&self, window: Window) -> Option<&TrayClient> {
        self.clients.iter().find(|client| client.matches(window))
    }

    pub fn find_mut(&mut self, window: Window) -> Option<&mut TrayClient> {
        self.clients.iter_mut().find(|client| client.matches(window))
    }

    /// Remove `window` from the registry. Returns whether it was embedded.
    pub fn remove(&mut self, window: Window) -> bool {
        let before = self.clients.len();
        self.clients.retain(|client| !client.matches(window));
        before != self.clients.len()
    }

    pub fn is_embedded(&self, window: Window) -> bool {
        self.find(window).is_some()
    }

    pub fn mapped_count(&self) -> usize {
        self.clients.iter().filter(|client| client.mapped()).count()
    }

    /// Slot index of `window`. Slots are handed out in reverse docking order and only to
    /// clients that are, or want to be, mapped.
    pub fn slot_of(&self, window: Window) -> Option<usize> {
        self.clients.iter().rev().filter(|client| client.occupies_slot()).position(|client| client.matches(window))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TrayClient> {
        self.clients.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut TrayClient> {
        self.clients.iter_mut()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = TrayClient> + '_ {
        self.clients.drain(..)
    }

    /// Window ids for logging, e.g. `0x1a00003, 0x2c00001`.
    pub fn describe(&self) -> String {
        self.clients.iter().map(|client| format!("{:#x}", client.window())).join(", ")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapped_client(registry: &mut ClientRegistry, window: Window) {
        registry.add(window, 16, 16).set_mapped(true);
    }

    #[test]
    fn test_add_find_remove() {
        let mut registry = ClientRegistry::default();
        registry.add(0x10, 16, 16);
        registry.add(0x20, 16, 16);
        assert!(registry.is_embedded(0x10));
        assert_eq!(Some(0x20), registry.find(0x20).map(TrayClient::window));
        assert_eq!(None, registry.find(0x30));

        assert!(registry.remove(0x10));
        assert!(!registry.is_embedded(0x10));
        assert_eq!(1, registry.len());
    }

    #[test]
    fn test_remove_unknown_window_is_noop() {
        let mut registry = ClientRegistry::default();
        registry.add(0x10, 16, 16);
        assert!(!registry.remove(0x99));
        assert_eq!(1, registry.len());
        assert_eq!("0x10", registry.describe());
    }

    #[test]
    fn test_window_is_registered_once() {
        let mut registry = ClientRegistry::default();
        registry.add(0x10, 16, 16);
        registry.add(0x10, 16, 16);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn test_mapped_count_and_slots() {
        let mut registry = ClientRegistry::default();
        mapped_client(&mut registry, 0x10);
        registry.add(0x20, 16, 16);
        mapped_client(&mut registry, 0x30);

        assert_eq!(2, registry.mapped_count());
        assert_eq!(Some(0), registry.slot_of(0x30));
        assert_eq!(Some(1), registry.slot_of(0x10));
        assert_eq!(None, registry.slot_of(0x20));

        registry.find_mut(0x20).unwrap().set_info(EmbedInfo { version: 0, flags: XEMBED_MAPPED });
        assert_eq!(Some(1), registry.slot_of(0x20));
        assert_eq!(Some(2), registry.slot_of(0x10));
    }

    #[test]
    fn test_embed_info_from_property() {
        assert_eq!(Some(EmbedInfo { version: 0, flags: 1 }), EmbedInfo::from_property(&[0, 1]));
        assert!(EmbedInfo::from_property(&[0, 1]).unwrap().wants_mapped());
        assert_eq!(None, EmbedInfo::from_property(&[0]));
    }
}
