use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use systray::{x11::X11Backend, TrayEvent, TrayManager};
use x11rb::{connection::Connection, protocol::Event, rust_connection::RustConnection};

mod bar;
mod config;
mod opts;

fn main() {
    let opts = opts::Opt::parse();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("traybar"), log_level_filter)
            .filter(Some("systray"), log_level_filter)
            .init();
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let config = match &opts.config {
        Some(path) => config::read_config(path)?,
        None => {
            let mut config = HashMap::new();
            config::with_defaults(&mut config);
            config
        }
    };

    let (conn, screen_num) = RustConnection::connect(None).context("Failed to connect to the X server")?;
    let conn = Arc::new(conn);
    let bar = bar::Bar::create(&conn, screen_num, &opts, &config)?;

    let mut tray = TrayManager::new(X11Backend::new(conn.clone(), screen_num));
    if let Err(err) = tray.setup(&config, &bar.settings) {
        log::error!("Failed to set up the tray manager, continuing without tray: {}", err);
    } else if tray.is_active() {
        log::debug!("Tray settings: {}", serde_json::to_string(tray.settings())?);
    }

    loop {
        let event = conn.wait_for_event().context("Lost connection to the X server")?;
        match event {
            Event::MapNotify(e) if e.window == bar.window => tray.on_bar_visibility_change(true),
            Event::UnmapNotify(e) if e.window == bar.window => tray.on_bar_visibility_change(false),
            event => {
                if let Some(event) = TrayEvent::from_x11(&event) {
                    tray.handle_event(&event);
                }
            }
        }
    }
}
