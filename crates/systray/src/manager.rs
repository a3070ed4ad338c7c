use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use x11rb::protocol::xproto::{Atom, ConfigureWindowAux, EventMask, Window};

use crate::{
    background::{BackgroundCompositor, BackgroundTarget},
    backend::Backend,
    client::ClientRegistry,
    config::{BarSettings, ConfigReader},
    container::Container,
    deferred::DeferredTask,
    embed::{self, Atoms, DockOutcome},
    event::TrayEvent,
    layout,
    selection::SelectionArbiter,
    settings::TraySettings,
    Rect, Result,
};


const DEFAULT_NOTIFY_DELAY: Duration = Duration::from_secs(1);

/// Non-blocking guard around a reconfiguration pass.
#[derive(Debug, Default)]
struct PassGuard(Arc<AtomicBool>);

impl PassGuard {
    fn try_enter(&self) -> Option<PassToken> {
        self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| PassToken(self.0.clone()))
    }
}

struct PassToken(Arc<AtomicBool>);

impl Drop for PassToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Manages the system tray on behalf of a bar.
///
/// All event handlers run on the thread owning the X connection. Errors concerning a single
/// client evict that client, other failures are logged; the tray only deactivates when its
/// window goes away, the selection is lost or activation fails.
pub struct TrayManager<B: Backend> {
    backend: B,
    settings: TraySettings,
    atoms: Option<Atoms>,
    selection: SelectionArbiter,
    clients: ClientRegistry,
    container: Container,
    background: BackgroundCompositor,
    activated: bool,
    in_pass: PassGuard,
    delayed_notify: DeferredTask,
    notify_delay: Duration,
}

impl<B: Backend> TrayManager<B> {
    pub fn new(backend: B) -> Self {
        TrayManager {
            backend,
            settings: TraySettings::default(),
            atoms: None,
            selection: SelectionArbiter::new(x11rb::NONE),
            clients: ClientRegistry::default(),
            container: Container::default(),
            background: BackgroundCompositor::default(),
            activated: false,
            in_pass: PassGuard::default(),
            delayed_notify: DeferredTask::new("tray-notify"),
            notify_delay: DEFAULT_NOTIFY_DELAY,
        }
    }

    /// Delay before pending clients are notified a second time after replacing another manager.
    pub fn with_notify_delay(mut self, delay: Duration) -> Self {
        self.notify_delay = delay;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &TraySettings {
        &self.settings
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn is_active(&self) -> bool {
        self.activated
    }

    pub fn container_window(&self) -> Window {
        self.container.window()
    }

    pub fn selection_atom(&self) -> Atom {
        self.selection.atom()
    }

    pub fn other_manager(&self) -> Window {
        self.selection.other_manager()
    }

    /// Read the tray configuration and activate the tray. Without a valid `tray-position` the
    /// tray stays inactive and nothing is sent to the server.
    pub fn setup<C: ConfigReader>(&mut self, config: &C, bar: &BarSettings) -> Result<()> {
        let Some(settings) = TraySettings::from_config(config, bar)? else {
            return Ok(());
        };
        self.settings = settings;

        self.atoms = Some(Atoms::intern(&self.backend)?);
        log::trace!("tray: Find systray selection atom for the default screen");
        let name = embed::selection_atom_name(self.backend.screen_number());
        self.selection = SelectionArbiter::new(self.backend.intern_atom(&name)?);

        self.activate()
    }

    pub fn activate(&mut self) -> Result<()> {
        let Some(atoms) = self.atoms else {
            return Ok(());
        };
        if self.activated {
            return Ok(());
        }

        log::info!("Activating tray manager");
        self.activated = true;
        self.settings.running = true;

        if let Err(err) = self.create_container(&atoms) {
            log::error!("Cannot activate tray manager... failed to setup window ({})", err);
            self.deactivate(false);
            return Err(err);
        }

        // root background changes are reported as property changes on the root window
        if let Err(err) = self.backend.ensure_event_mask(self.backend.root(), EventMask::PROPERTY_CHANGE) {
            log::warn!("Failed to listen for root window property changes ({})", err);
        }
        self.flush();

        let own = self.container.window();
        if let Err(err) = self.selection.acquire(&self.backend, own) {
            log::error!("{}", err);
            self.deactivate(true);
            return Err(err);
        }

        self.notify_clients();

        let other = self.selection.other_manager();
        if other != x11rb::NONE && other != own {
            self.notify_clients_delayed();
        }
        Ok(())
    }

    fn create_container(&mut self, atoms: &Atoms) -> Result<()> {
        let geometry = layout::container_geometry(&self.settings, self.clients.mapped_count());
        self.container.create_window(&self.backend, atoms, &self.settings, geometry)?;

        if let Err(err) = self.container.create_background(&self.backend, &self.settings) {
            log::error!("Failed to create tray background ({})", err);
        }
        self.container.restack(&self.backend, self.settings.sibling);
        if let Err(err) = self.container.set_hints(&self.backend, atoms) {
            log::error!("Failed to set tray window hints ({})", err);
        }
        if let Err(err) = self.container.set_color_hint(&self.backend, atoms, self.settings.background) {
            log::error!("Failed to set tray colors ({})", err);
        }
        Ok(())
    }

    /// Give up the tray: hand all clients back to the root window and release every resource.
    pub fn deactivate(&mut self, clear_selection: bool) {
        if !self.activated {
            return;
        }

        log::info!("Deactivating tray manager");
        self.activated = false;
        self.settings.running = false;

        if clear_selection {
            if let Err(err) = self.selection.release(&self.backend) {
                log::error!("Failed to release the systray selection ({})", err);
            }
        } else {
            self.selection.reset();
        }

        log::trace!("tray: Unembed clients");
        for client in self.clients.drain() {
            if let Err(err) = embed::unembed(&self.backend, client.window()) {
                log::debug!("Failed to unembed {:#x} ({})", client.window(), err);
            }
        }

        self.container.destroy(&self.backend);
        self.background.reset();
        self.settings.configured_w = 0;
        self.settings.configured_x = 0;
        self.settings.configured_slots = 0;

        self.flush();
    }

    /// Bring clients, container and background in line with the current client set.
    /// Skipped while another pass is running.
    pub fn reconfigure(&mut self) {
        if !self.container.exists() {
            return;
        }
        let Some(pass) = self.in_pass.try_enter() else {
            log::trace!("tray: Reconfigure already in progress, skipping");
            return;
        };

        self.reconfigure_clients();
        if let Err(err) = self.reconfigure_window() {
            log::error!("Failed to reconfigure tray window ({})", err);
        }
        if let Err(err) = self.reconfigure_bg(false) {
            log::error!("Failed to reconfigure tray background ({})", err);
        }
        self.settings.configured_slots = self.clients.mapped_count();

        drop(pass);
        self.refresh_window();
        self.flush();
    }

    fn reconfigure_clients(&mut self) {
        log::trace!("tray: Reconfigure clients");
        let y = layout::client_y(&self.settings);
        let mut slot = 0;
        let mut evicted = Vec::new();

        for client in self.clients.iter_mut().rev() {
            let result = client.ensure_state(&self.backend).and_then(|_| {
                if client.occupies_slot() {
                    client.reconfigure(&self.backend, layout::client_x(&self.settings, slot), y)?;
                    slot += 1;
                }
                Ok(())
            });
            match result {
                Ok(()) => {}
                Err(err) if err.is_window_error() => {
                    log::error!("Failed to reconfigure tray client {:#x}, removing... ({})", client.window(), err);
                    evicted.push(client.window());
                }
                Err(err) => log::error!("Failed to reconfigure tray client {:#x} ({})", client.window(), err),
            }
        }

        for window in evicted {
            self.remove_client(window, false);
        }
    }

    fn reconfigure_window(&mut self) -> Result<()> {
        let mapped = self.clients.mapped_count();
        log::trace!("tray: Reconfigure window (mapped={}, clients={})", self.container.is_mapped(), self.clients.len());
        if !self.container.exists() {
            return Ok(());
        }

        let window = self.container.window();
        if mapped == 0 && self.container.is_mapped() {
            log::trace!("tray: Reconfigure window / unmap");
            self.backend.unmap_window(window)?;
        } else if mapped > 0 && !self.container.is_mapped() && !self.container.is_hidden() {
            log::trace!("tray: Reconfigure window / map");
            self.backend.map_window(window)?;
        }

        let width = layout::container_width(&self.settings, mapped);
        let x = layout::container_x(&self.settings, width);
        if self.settings.configured_w == width && self.settings.configured_x == x {
            log::trace!("tray: Reconfigure window / ignoring unchanged values w={} x={}", width, x);
            return Ok(());
        }

        if width > 0 {
            log::trace!("tray: New window values, width={}, x={}", width, x);
            let aux = ConfigureWindowAux::new().width(width as u32).x(x as i32);
            self.backend.configure_window(window, &aux)?;
        }

        self.settings.configured_w = width;
        self.settings.configured_x = x;
        Ok(())
    }

    fn reconfigure_bg(&mut self, force: bool) -> Result<()> {
        let Some(atoms) = self.atoms else {
            return Ok(());
        };
        let mapped = self.clients.mapped_count();
        if !self.settings.transparent || mapped == 0 || !self.container.is_mapped() || self.container.pixmap() == x11rb::NONE {
            return Ok(());
        }

        let width = layout::container_width(&self.settings, mapped);
        let target = BackgroundTarget {
            pixmap: self.container.pixmap(),
            gc: self.container.gc(),
            x: layout::container_x(&self.settings, width),
            y: layout::container_y(&self.settings),
            width,
            height: layout::container_height(&self.settings),
        };
        self.background.refresh(&self.backend, &atoms, &target, force)
    }

    /// Repaint the container and all clients.
    pub fn refresh_window(&mut self) {
        if !self.activated || !self.container.is_mapped() {
            return;
        }
        let Some(_pass) = self.in_pass.try_enter() else {
            return;
        };

        log::trace!("tray: Refreshing window");
        let mapped = self.clients.mapped_count();
        let area = Rect::new(0, 0, layout::container_width(&self.settings, mapped), layout::container_height(&self.settings));

        if self.settings.transparent && !self.background.has_root_pixmap() && self.container.pixmap() != x11rb::NONE {
            if let Err(err) = self.backend.fill_rectangle(self.container.pixmap(), self.container.gc(), area) {
                log::error!("Failed to fill tray background ({})", err);
            }
        }

        if let Err(err) = self.backend.clear_area(self.container.window(), area, false) {
            log::error!("Failed to clear tray window ({})", err);
        }
        for client in self.clients.iter() {
            if let Err(err) = client.clear_window(&self.backend) {
                log::debug!("Failed to clear tray client {:#x} ({})", client.window(), err);
            }
        }

        self.flush();
        self.settings.configured_w = area.width;
    }

    pub fn redraw_window(&mut self, force_bg: bool) {
        log::info!("Redraw tray container (id={:#x})", self.container.window());
        if let Err(err) = self.reconfigure_bg(force_bg) {
            log::error!("Failed to reconfigure tray background ({})", err);
        }
        self.refresh_window();
    }

    /// Broadcast the `MANAGER` announcement so waiting clients send their dock requests.
    pub fn notify_clients(&self) {
        let Some(atoms) = self.atoms.filter(|_| self.activated) else {
            return;
        };
        log::info!("Notifying pending tray clients");
        let root = self.backend.root();
        let message = self.selection.announcement(&atoms, root, self.container.window());
        if let Err(err) = self.backend.send_client_message(root, EventMask::STRUCTURE_NOTIFY, message) {
            log::error!("Failed to notify pending tray clients ({})", err);
        }
    }

    /// Repeat the announcement after a delay, for clients that were talking to the previous manager.
    pub fn notify_clients_delayed(&mut self) {
        let Some(atoms) = self.atoms.filter(|_| self.activated) else {
            return;
        };
        let message = self.selection.announcement(&atoms, self.backend.root(), self.container.window());
        let announcer = self.backend.announcer();
        self.delayed_notify.schedule(self.notify_delay, move || {
            log::info!("Notifying pending tray clients");
            if let Err(err) = announcer.announce(message) {
                log::error!("Failed to notify pending tray clients ({})", err);
            }
        });
    }

    pub fn remove_client(&mut self, window: Window, reconfigure: bool) {
        if self.clients.remove(window) {
            log::info!("Removed tray client {:#x}", window);
        }
        if reconfigure {
            self.reconfigure();
        }
    }

    /// Follow the bar's visibility when the container could not be stacked above it.
    pub fn on_bar_visibility_change(&mut self, visible: bool) {
        log::trace!("tray: visibility_change {}", visible);
        self.container.set_hidden(!visible);
        if !self.activated || self.container.is_restacked() {
            return;
        }

        let window = self.container.window();
        let mapped = self.clients.mapped_count();
        let result = if visible && !self.container.is_mapped() && mapped > 0 {
            self.backend.map_window(window)
        } else if (mapped == 0 || !visible) && self.container.is_mapped() {
            self.backend.unmap_window(window)
        } else if self.container.is_mapped() && visible && mapped > 0 {
            self.redraw_window(false);
            Ok(())
        } else {
            Ok(())
        };
        if let Err(err) = result {
            log::error!("Failed to follow bar visibility ({})", err);
        }
        self.flush();
    }

    pub fn handle_event(&mut self, event: &TrayEvent) {
        match *event {
            TrayEvent::Expose { count, .. } => {
                if self.activated && !self.clients.is_empty() && count == 0 {
                    self.redraw_window(false);
                }
            }
            TrayEvent::VisibilityNotify { window } => {
                if self.activated && !self.clients.is_empty() {
                    log::trace!("tray: Received visibility_notify for {:#x}", window);
                    if let Err(err) = self.reconfigure_window() {
                        log::error!("Failed to reconfigure tray window ({})", err);
                    }
                }
            }
            TrayEvent::ClientMessage { window, type_, format, data } => self.handle_client_message(window, type_, format, data),
            TrayEvent::ConfigureRequest { window } | TrayEvent::ResizeRequest { window } => {
                if self.activated && self.clients.is_embedded(window) {
                    log::trace!("tray: Client configure request {:#x}", window);
                    self.assert_client_geometry(window);
                }
            }
            TrayEvent::SelectionClear { owner, selection } => {
                if self.activated && selection == self.selection.atom() && owner == self.container.window() {
                    log::warn!("Lost systray selection, deactivating...");
                    self.selection.handle_lost(&self.backend);
                    self.deactivate(false);
                }
            }
            TrayEvent::PropertyNotify { window, atom, deleted } => self.handle_property_change(window, atom, deleted),
            TrayEvent::ReparentNotify { window, parent } => {
                if self.activated && self.clients.is_embedded(window) && parent != self.container.window() {
                    log::trace!("tray: Received reparent_notify for client, remove...");
                    self.remove_client(window, true);
                }
            }
            TrayEvent::DestroyNotify { window } => {
                if self.activated && window == self.container.window() {
                    self.container.forget_window();
                    self.deactivate(true);
                } else if !self.activated && window == self.selection.other_manager() {
                    log::info!("Systray selection owner {:#x} went away", window);
                } else if self.activated && self.clients.is_embedded(window) {
                    log::trace!("tray: Received destroy_notify for client, remove...");
                    self.remove_client(window, true);
                    self.redraw_window(false);
                }
            }
            TrayEvent::MapNotify { window } => {
                if self.activated && window == self.container.window() {
                    log::trace!("tray: Update container mapped flag");
                    self.container.set_mapped(true);
                    self.redraw_window(false);
                } else if let Some(client) = self.clients.find_mut(window) {
                    log::trace!("tray: Set client mapped");
                    client.set_mapped(true);
                    if self.clients.mapped_count() > self.settings.configured_slots {
                        self.reconfigure();
                    }
                }
            }
            TrayEvent::UnmapNotify { window } => {
                if self.activated && window == self.container.window() {
                    log::trace!("tray: Update container mapped flag");
                    self.container.set_mapped(false);
                } else if self.activated {
                    if let Some(client) = self.clients.find_mut(window) {
                        log::trace!("tray: Set client unmapped");
                        client.set_mapped(false);
                        if self.clients.mapped_count() < self.settings.configured_slots {
                            self.reconfigure();
                        }
                    }
                }
            }
        }
    }

    fn handle_client_message(&mut self, window: Window, type_: Atom, format: u8, data: [u32; 5]) {
        let Some(atoms) = self.atoms.filter(|_| self.activated) else {
            return;
        };

        if type_ == atoms.WM_PROTOCOLS && data[0] == atoms.WM_DELETE_WINDOW && window == self.container.window() {
            log::warn!("Received WM_DELETE");
            self.container.forget_window();
            self.deactivate(true);
        } else if type_ == atoms._NET_SYSTEM_TRAY_OPCODE && format == 32 {
            log::trace!("tray: Received client_message");
            match data[1] {
                embed::SYSTEM_TRAY_REQUEST_DOCK => self.dock(&atoms, data[2]),
                embed::SYSTEM_TRAY_BEGIN_MESSAGE | embed::SYSTEM_TRAY_CANCEL_MESSAGE => {
                    log::trace!("tray: Ignoring balloon message from {:#x}", window);
                }
                opcode => log::debug!("Unknown systray opcode {} from {:#x}", opcode, window),
            }
        }
    }

    fn dock(&mut self, atoms: &Atoms, window: Window) {
        let outcome = embed::process_docking_request(
            &self.backend,
            atoms,
            &self.settings,
            self.container.window(),
            &mut self.clients,
            window,
        );
        if let DockOutcome::Embedded { mapped } = outcome {
            log::debug!("Embedded tray client {:#x} (mapped={}, clients: {})", window, mapped, self.clients.describe());
        }
    }

    /// Embedded clients may not move or resize themselves, tell them where they belong instead.
    fn assert_client_geometry(&mut self, window: Window) {
        let x = layout::client_x(&self.settings, self.clients.slot_of(window).unwrap_or(0));
        let y = layout::client_y(&self.settings);
        let Some(client) = self.clients.find(window) else {
            return;
        };
        match client.configure_notify(&self.backend, x, y) {
            Ok(()) => {}
            Err(err) if err.is_window_error() => {
                log::error!("Failed to reconfigure tray client, removing... ({})", err);
                self.remove_client(window, true);
            }
            Err(err) => log::error!("Failed to reconfigure tray client {:#x} ({})", window, err),
        }
    }

    fn handle_property_change(&mut self, window: Window, atom: Atom, deleted: bool) {
        let Some(atoms) = self.atoms.filter(|_| self.activated) else {
            return;
        };
        if atoms.is_root_background(atom) {
            self.background.invalidate();
            self.redraw_window(true);
            return;
        }
        if atom != atoms._XEMBED_INFO {
            return;
        }
        let Some(client) = self.clients.find(window) else {
            return;
        };

        log::trace!("tray: _XEMBED_INFO: {:#x}", window);
        if !deleted {
            log::trace!("tray: _XEMBED_INFO value has changed");
        }
        let wanted_mapped = client.info().wants_mapped();

        match embed::query_info(&self.backend, &atoms, window) {
            Ok(info) => {
                log::trace!("tray: _XEMBED_INFO[0]={} _XEMBED_INFO[1]={}", info.version, info.flags);
                if let Some(client) = self.clients.find_mut(window) {
                    client.set_info(info);
                }
                if info.wants_mapped() || wanted_mapped {
                    self.reconfigure();
                }
            }
            Err(err) if err.is_window_error() => {
                log::error!("Failed to query for _XEMBED_INFO, removing client... ({})", err);
                self.remove_client(window, true);
            }
            Err(err) => log::error!("{}", err),
        }
    }

    fn flush(&self) {
        if let Err(err) = self.backend.flush() {
            log::error!("Failed to flush the connection ({})", err);
        }
    }
}

impl<B: Backend> Drop for TrayManager<B> {
    fn drop(&mut self) {
        self.delayed_notify.join();
        self.deactivate(true);
    }
}
