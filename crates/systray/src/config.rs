use std::{collections::HashMap, fmt, str::FromStr};

use derive_more::{Debug, Display};
use once_cell::sync::Lazy;
use serde::Serialize;
use smart_default::SmartDefault;
use x11rb::protocol::xproto::Window;

use crate::{backend::Rect, Error, Result};

/// Key/value lookups against the bar configuration.
pub trait ConfigReader {
    fn get_raw(&self, key: &str) -> Option<String>;

    /// Parse the value of `key`, falling back to `default` when the key is missing or empty.
    fn read<T: FromStr>(&self, key: &str, default: T) -> Result<T>
    where
        Self: Sized,
    {
        match self.get_raw(key) {
            Some(value) if !value.trim().is_empty() => match value.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(_) => Err(Error::Config { key: key.to_string(), value }),
            },
            _ => Ok(default),
        }
    }
}

impl ConfigReader for HashMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UnitParseError {
    #[error("Failed to parse \"{0}\" as a length value")]
    NumParseFailed(String),
    #[error("Invalid unit \"{0}\", must be either % or px")]
    InvalidUnit(String),
}

/// A length given either in pixels or relative to some container.
#[derive(Clone, Copy, PartialEq, Display, Debug, SmartDefault)]
pub enum NumWithUnit {
    #[display("{_0}%")]
    #[debug("{_0}%")]
    Percent(f32),
    #[display("{_0}px")]
    #[debug("{_0}px")]
    #[default]
    Pixels(i32),
}

impl NumWithUnit {
    pub fn pixels_relative_to(&self, max: i32) -> i32 {
        match *self {
            NumWithUnit::Percent(n) => ((max as f64 / 100.0) * n as f64) as i32,
            NumWithUnit::Pixels(n) => n,
        }
    }
}

impl FromStr for NumWithUnit {
    type Err = UnitParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        static PATTERN: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^(-?\d+(?:\.\d+)?)\s*(.*)$").unwrap());

        let captures = PATTERN.captures(s.trim()).ok_or_else(|| UnitParseError::NumParseFailed(s.to_string()))?;
        let value = captures[1].parse::<f32>().map_err(|_| UnitParseError::NumParseFailed(s.to_string()))?;
        match &captures[2] {
            "px" | "" => Ok(NumWithUnit::Pixels(value.floor() as i32)),
            "%" => Ok(NumWithUnit::Percent(value)),
            unit => Err(UnitParseError::InvalidUnit(unit.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid color \"{0}\", expected #rgb, #rrggbb or #aarrggbb")]
pub struct ColorParseError(String);

/// A 32 bit color stored as `0xAARRGGBB`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Display, Serialize)]
#[display("#{_0:08x}")]
pub struct Rgba(pub u32);

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rgba({self})")
    }
}

impl Rgba {
    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| err())?;
        match hex.len() {
            3 => {
                let expand = |nibble: u32| (nibble & 0xf) * 0x11;
                Ok(Rgba(0xff00_0000 | expand(value >> 8) << 16 | expand(value >> 4) << 8 | expand(value)))
            }
            6 => Ok(Rgba(0xff00_0000 | value)),
            8 => Ok(Rgba(value)),
            _ => Err(err()),
        }
    }
}

/// Geometry of the host bar the tray is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BarSettings {
    /// The bar window, the tray container is stacked right above it.
    pub window: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_top: u16,
    pub border_bottom: u16,
    /// The part of the bar that modules may draw on.
    pub inner_area: Rect,
    pub monitor: Rect,
    pub background: Rgba,
}
