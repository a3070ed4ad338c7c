use x11rb::protocol::xproto::{Atom, ChangeWindowAttributesAux, EventMask, Window};

use crate::{backend::Backend, embed::Atoms, ClientMessage, Error, Result};

/// Result of trying to become the tray selection owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    AlreadyOwned,
    /// Another manager holds the selection. It is recorded and tracked, but not contested.
    Replacing(Window),
    Acquired,
}

/// Ownership state of the `_NET_SYSTEM_TRAY_S<n>` selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionArbiter {
    atom: Atom,
    other_manager: Window,
    acquired: bool,
}

impl SelectionArbiter {
    pub fn new(atom: Atom) -> Self {
        SelectionArbiter { atom, other_manager: x11rb::NONE, acquired: false }
    }

    pub fn atom(&self) -> Atom {
        self.atom
    }

    /// The last observed owner that is not us, `0` if there is none.
    pub fn other_manager(&self) -> Window {
        self.other_manager
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn acquire(&mut self, backend: &dyn Backend, own: Window) -> Result<Acquisition> {
        let owner = backend.get_selection_owner(self.atom)?;
        if owner == own {
            log::info!("tray: Already managing the systray selection");
            self.acquired = true;
            return Ok(Acquisition::AlreadyOwned);
        }

        self.other_manager = owner;
        if owner != x11rb::NONE {
            log::info!("Replacing selection manager {:#x}", owner);
            return Ok(Acquisition::Replacing(owner));
        }

        log::trace!("tray: Change selection owner to {:#x}", own);
        backend.set_selection_owner(own, self.atom)?;
        if backend.get_selection_owner(self.atom)? != own {
            return Err(Error::AcquisitionFailed);
        }
        self.acquired = true;
        Ok(Acquisition::Acquired)
    }

    /// Listen for structure changes on `owner` so its destruction can be observed.
    pub fn track_owner(&self, backend: &dyn Backend, owner: Window) -> Result<()> {
        if owner == x11rb::NONE {
            return Ok(());
        }
        log::trace!("tray: Listen for events on the new selection window");
        backend.change_window_attributes(owner, &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY))
    }

    /// Give up the selection if we hold it.
    pub fn release(&mut self, backend: &dyn Backend) -> Result<()> {
        if !self.acquired {
            return Ok(());
        }
        log::trace!("tray: Unset selection owner");
        self.acquired = false;
        backend.set_selection_owner(x11rb::NONE, self.atom)
    }

    /// Someone else took the selection: remember and watch the new owner.
    pub fn handle_lost(&mut self, backend: &dyn Backend) {
        self.acquired = false;
        let tracked = backend.get_selection_owner(self.atom).and_then(|owner| {
            self.track_owner(backend, owner)?;
            Ok(owner)
        });
        self.other_manager = match tracked {
            Ok(owner) => owner,
            Err(err) => {
                log::error!("Failed to get systray selection owner ({})", err);
                x11rb::NONE
            }
        };
    }

    /// Forget that the selection was held, without talking to the server.
    pub fn reset(&mut self) {
        self.acquired = false;
    }

    /// The `MANAGER` announcement broadcast to the root window.
    pub fn announcement(&self, atoms: &Atoms, root: Window, tray: Window) -> ClientMessage {
        ClientMessage { window: root, type_: atoms.MANAGER, data: [x11rb::CURRENT_TIME, self.atom, tray, 0, 0] }
    }
}
