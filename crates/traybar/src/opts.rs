use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, PartialEq)]
#[command(version, about = "A minimal X11 bar hosting an XEmbed system tray")]
pub struct Opt {
    /// JSON file with the bar and tray settings, e.g. `{ "tray-position": "right" }`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Height of the bar in pixels
    #[arg(long, default_value_t = 24)]
    pub height: u16,

    /// Put the bar at the bottom of the screen
    #[arg(long)]
    pub bottom: bool,

    #[arg(long, default_value_t = 0)]
    pub border_top: u16,

    #[arg(long, default_value_t = 0)]
    pub border_bottom: u16,

    /// Write out debug logs
    #[arg(long = "debug")]
    pub log_debug: bool,
}
