use std::collections::HashMap;

use anyhow::{Context, Result};
use systray::{BarSettings, ConfigReader, Rect, Rgba};
use x11rb::{
    connection::Connection,
    protocol::xproto::*,
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    COPY_DEPTH_FROM_PARENT,
};

use crate::opts::Opt;

x11rb::atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_STATE,
        _NET_WM_STATE_STICKY,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STRUT,
        _NET_WM_STRUT_PARTIAL,
        _NET_WM_NAME,
        UTF8_STRING,
        CARDINAL,
        ATOM,
    }
}

/// The host dock window spanning the full width of the screen.
pub struct Bar {
    pub window: Window,
    pub settings: BarSettings,
}

impl Bar {
    pub fn create(conn: &RustConnection, screen_num: usize, opts: &Opt, config: &HashMap<String, String>) -> Result<Bar> {
        let screen = &conn.setup().roots[screen_num];
        let atoms = AtomCollection::new(conn)?.reply()?;
        let background: Rgba = config.read("background", Rgba(0xff222222))?;

        let monitor = Rect::new(0, 0, screen.width_in_pixels, screen.height_in_pixels);
        let height = opts.height.max(opts.border_top + opts.border_bottom + 1);
        let y = if opts.bottom { monitor.height.saturating_sub(height) as i16 } else { 0 };
        let geometry = Rect::new(0, y, monitor.width, height);

        let window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            geometry.x,
            geometry.y,
            geometry.width,
            geometry.height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new().background_pixel(background.0).event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::EXPOSURE),
        )?
        .check()
        .context("Failed to create bar window")?;

        conn.change_property8(PropMode::REPLACE, window, atoms._NET_WM_NAME, atoms.UTF8_STRING, b"traybar")?.check()?;
        conn.change_property8(PropMode::REPLACE, window, AtomEnum::WM_CLASS, AtomEnum::STRING, b"traybar\0Traybar\0")?
            .check()?;
        conn.change_property32(PropMode::REPLACE, window, atoms._NET_WM_WINDOW_TYPE, atoms.ATOM, &[
            atoms._NET_WM_WINDOW_TYPE_DOCK,
        ])?
        .check()?;
        conn.change_property32(PropMode::REPLACE, window, atoms._NET_WM_STATE, atoms.ATOM, &[
            atoms._NET_WM_STATE_STICKY,
            atoms._NET_WM_STATE_ABOVE,
        ])?
        .check()?;

        let end_x = (monitor.width as u32).saturating_sub(1);
        // left, right, top, bottom, left_start_y, left_end_y, right_start_y, right_end_y, top_start_x, top_end_x, bottom_start_x, bottom_end_x
        #[rustfmt::skip]
        let strut: [u32; 12] = if opts.bottom {
            [0, 0, 0, height as u32, 0, 0, 0, 0, 0, 0, 0, end_x]
        } else {
            [0, 0, height as u32, 0, 0, 0, 0, 0, 0, end_x, 0, 0]
        };
        conn.change_property32(PropMode::REPLACE, window, atoms._NET_WM_STRUT, atoms.CARDINAL, &strut[0..4])?.check()?;
        conn.change_property32(PropMode::REPLACE, window, atoms._NET_WM_STRUT_PARTIAL, atoms.CARDINAL, &strut)?.check()?;

        conn.map_window(window)?.check().context("Failed to map bar window")?;
        conn.flush().context("Failed to send requests to X server")?;

        let settings = bar_settings(window, geometry, monitor, opts, background);
        log::info!("Bar window {:#x} at {}", window, geometry);
        Ok(Bar { window, settings })
    }
}

fn bar_settings(window: Window, geometry: Rect, monitor: Rect, opts: &Opt, background: Rgba) -> BarSettings {
    let inner_height = geometry.height.saturating_sub(opts.border_top).saturating_sub(opts.border_bottom);
    BarSettings {
        window,
        x: geometry.x,
        y: geometry.y,
        width: geometry.width,
        height: geometry.height,
        border_top: opts.border_top,
        border_bottom: opts.border_bottom,
        inner_area: Rect::new(geometry.x, geometry.y + opts.border_top as i16, geometry.width, inner_height),
        monitor,
        background,
    }
}
