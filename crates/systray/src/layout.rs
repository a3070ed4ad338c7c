//! Geometry of the tray container and its slots.
//!
//! Slots are laid out from the anchor edge in reverse docking order, so the icon that docked
//! last sits closest to the anchor and existing icons keep their relative order.

use crate::{
    backend::Rect,
    config::NumWithUnit,
    settings::{Alignment, TraySettings},
};

/// Resolve a configured offset against the dimension of the area it is relative to.
pub fn resolve_offset(offset: NumWithUnit, area: u16) -> i32 {
    offset.pixels_relative_to(area as i32)
}

/// Total width of `mapped` slots including the spacing around them, `0` if there are none.
pub fn container_width(settings: &TraySettings, mapped: usize) -> u16 {
    if mapped == 0 {
        return 0;
    }
    let slot = settings.width as usize + settings.spacing as usize;
    (settings.spacing as usize + mapped * slot).min(u16::MAX as usize) as u16
}

pub fn container_height(settings: &TraySettings) -> u16 {
    settings.height_fill
}

pub fn container_x(settings: &TraySettings, width: u16) -> i16 {
    let anchor = settings.orig_x as i32;
    let x = match settings.align {
        Alignment::None | Alignment::Left => anchor,
        Alignment::Center => anchor - (width / 2) as i32,
        Alignment::Right => anchor - width as i32,
    };
    x as i16
}

pub fn container_y(settings: &TraySettings) -> i16 {
    settings.orig_y
}

pub fn container_geometry(settings: &TraySettings, mapped: usize) -> Rect {
    let width = container_width(settings, mapped);
    Rect::new(container_x(settings, width), container_y(settings), width, container_height(settings))
}

/// Position of the slot with the given index, relative to the container.
pub fn client_x(settings: &TraySettings, slot: usize) -> i16 {
    let slot_width = settings.width as i32 + settings.spacing as i32;
    (settings.spacing as i32 + slot as i32 * slot_width) as i16
}

/// Icons are centered vertically in the container.
pub fn client_y(settings: &TraySettings) -> i16 {
    (settings.height_fill.saturating_sub(settings.height) / 2) as i16
}
