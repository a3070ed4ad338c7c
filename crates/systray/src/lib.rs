//! XEmbed system tray manager.
//!
//! The [`TrayManager`] owns the `_NET_SYSTEM_TRAY_S<n>` selection on behalf of a status bar,
//! embeds icon windows of dock-requesting clients into a container window and keeps the
//! container's geometry and (pseudo-transparent) background in sync with its clients.
//! All protocol requests go through the [`Backend`] trait; [`x11::X11Backend`] implements it
//! on top of x11rb.

pub mod background;
pub mod backend;
pub mod client;
pub mod config;
pub mod container;
pub mod deferred;
pub mod embed;
mod error;
pub mod event;
pub mod layout;
pub mod manager;
pub mod selection;
pub mod settings;
pub mod x11;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Announcer, Backend, ClientMessage, Image, Rect};
pub use config::{BarSettings, ConfigReader, NumWithUnit, Rgba};
pub use error::*;
pub use event::TrayEvent;
pub use manager::TrayManager;
pub use settings::{Alignment, TraySettings};
