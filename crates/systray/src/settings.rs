use derive_more::Display;
use serde::Serialize;
use smart_default::SmartDefault;
use x11rb::protocol::xproto::Window;

use crate::{
    config::{BarSettings, ConfigReader, NumWithUnit, Rgba},
    layout, Error, Result,
};

/// Which edge of the bar's usable area the tray is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault, Display, Serialize)]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Anything but `left`, `center` or `right` disables the tray.
    pub fn from_position(position: &str) -> Self {
        match position.trim() {
            "left" => Alignment::Left,
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TraySettings {
    pub align: Alignment,
    pub running: bool,
    pub detached: bool,
    /// Anchor point of the container. Left edge for [`Alignment::Left`], center for
    /// [`Alignment::Center`] and right edge for [`Alignment::Right`].
    pub orig_x: i16,
    pub orig_y: i16,
    pub width_max: u16,
    /// Width of a single slot.
    pub width: u16,
    /// Height of a single icon.
    pub height: u16,
    /// Height of the container.
    pub height_fill: u16,
    pub spacing: u16,
    pub background: Rgba,
    pub transparent: bool,
    pub sibling: Window,

    pub configured_w: u16,
    pub configured_x: i16,
    pub configured_slots: usize,
}

impl TraySettings {
    /// Derive the tray settings from the bar configuration and geometry.
    /// Returns `None` when no valid `tray-position` is configured.
    pub fn from_config<C: ConfigReader>(config: &C, bar: &BarSettings) -> Result<Option<TraySettings>> {
        let align = Alignment::from_position(&config.read("tray-position", String::new())?);
        if align == Alignment::None {
            log::warn!("Disabling tray manager (reason: position not set or invalid)");
            return Ok(None);
        }

        let mut settings = TraySettings { align, detached: config.read("tray-detached", false)?, ..Default::default() };

        settings.height = bar.height.saturating_sub(bar.border_top).saturating_sub(bar.border_bottom);
        settings.height_fill = settings.height;
        if settings.height % 2 != 0 {
            settings.height -= 1;
        }

        let maxsize: u16 = config.read("tray-maxsize", 16)?;
        if settings.height > maxsize {
            settings.spacing += (settings.height - maxsize) / 2;
            settings.height = maxsize;
        }

        settings.width_max = bar.width;
        settings.width = settings.height;
        settings.orig_y = bar.y + bar.border_top as i16;

        let scale: f32 = config.read("tray-scale", 1.0)?;
        if scale <= 0.0 {
            return Err(Error::Config { key: "tray-scale".to_string(), value: scale.to_string() });
        }
        settings.width = (settings.width as f32 * scale) as u16;
        settings.height_fill = (settings.height_fill as f32 * scale) as u16;
        settings.height = settings.height.min(settings.height_fill);

        let inner = bar.inner_area;
        settings.orig_x = match align {
            Alignment::None | Alignment::Left => inner.x,
            Alignment::Center => inner.x + (inner.width / 2) as i16,
            Alignment::Right => inner.x + inner.width as i16,
        };

        settings.transparent = config.read("tray-transparent", false)?;
        if !settings.transparent {
            let background: String = config.read("tray-background", String::new())?;
            if background.len() > 7 {
                log::warn!("Alpha support for the systray is limited, only fully transparent backgrounds are supported");
            }
            settings.background = if background.is_empty() {
                bar.background
            } else {
                background.parse().map_err(|_| Error::Config { key: "tray-background".to_string(), value: background })?
            };
            if settings.background.alpha() == 0 {
                settings.transparent = true;
                settings.background = Rgba(0);
            }
        }

        settings.spacing += config.read::<u16>("tray-padding", 0)?;

        let offset_x: NumWithUnit = config.read("tray-offset-x", NumWithUnit::Pixels(0))?;
        let offset_y: NumWithUnit = config.read("tray-offset-y", NumWithUnit::Pixels(0))?;
        let (area_width, area_height) = if settings.detached {
            (bar.monitor.width, bar.monitor.height)
        } else {
            (inner.width, inner.height)
        };
        settings.orig_x = offset_coordinate(settings.orig_x, layout::resolve_offset(offset_x, area_width));
        settings.orig_y = offset_coordinate(settings.orig_y, layout::resolve_offset(offset_y, area_height));

        settings.sibling = bar.window;

        Ok(Some(settings))
    }
}

fn offset_coordinate(origin: i16, offset: i32) -> i16 {
    (origin as i32 + offset).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::backend::Rect;
    use pretty_assertions::assert_eq;

    fn bar() -> BarSettings {
        BarSettings {
            window: 0x200,
            x: 0,
            y: 0,
            width: 1000,
            height: 31,
            border_top: 2,
            border_bottom: 0,
            inner_area: Rect::new(10, 2, 980, 29),
            monitor: Rect::new(0, 0, 1920, 1080),
            background: Rgba(0xff222222),
        }
    }

    fn config(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_position_unset_disables_tray() {
        assert_eq!(None, TraySettings::from_config(&config(&[]), &bar()).unwrap());
        assert_eq!(None, TraySettings::from_config(&config(&[("tray-position", "top")]), &bar()).unwrap());
    }

    #[test]
    fn test_icon_size_clamped_to_maxsize() {
        let settings = TraySettings::from_config(&config(&[("tray-position", "right")]), &bar()).unwrap().unwrap();
        // 31 - 2 = 29 (fill), 28 after even correction, clamped to 16 with (28 - 16) / 2 spacing
        assert_eq!(29, settings.height_fill);
        assert_eq!(16, settings.height);
        assert_eq!(16, settings.width);
        assert_eq!(6, settings.spacing);
        assert_eq!(990, settings.orig_x);
        assert_eq!(2, settings.orig_y);
        assert_eq!(0x200, settings.sibling);
        assert_eq!(Rgba(0xff222222), settings.background);
        assert!(!settings.transparent);
    }

    #[test]
    fn test_scale_and_padding() {
        let settings = TraySettings::from_config(
            &config(&[("tray-position", "left"), ("tray-maxsize", "40"), ("tray-scale", "1.5"), ("tray-padding", "3")]),
            &bar(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(28, settings.height);
        assert_eq!(42, settings.width);
        assert_eq!(43, settings.height_fill);
        assert_eq!(3, settings.spacing);
        assert_eq!(10, settings.orig_x);
        assert!(settings.height_fill >= settings.height);
    }

    #[test]
    fn test_transparent_background() {
        let settings =
            TraySettings::from_config(&config(&[("tray-position", "center"), ("tray-background", "#00ffffff")]), &bar())
                .unwrap()
                .unwrap();
        assert!(settings.transparent);
        assert_eq!(Rgba(0), settings.background);
        assert_eq!(10 + 490, settings.orig_x);
    }

    #[test]
    fn test_offsets() {
        let attached = TraySettings::from_config(
            &config(&[("tray-position", "left"), ("tray-offset-x", "50%"), ("tray-offset-y", "-2")]),
            &bar(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(10 + 490, attached.orig_x);
        assert_eq!(0, attached.orig_y);

        let detached = TraySettings::from_config(
            &config(&[("tray-position", "left"), ("tray-detached", "true"), ("tray-offset-x", "50%")]),
            &bar(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(10 + 960, detached.orig_x);
    }

    #[test]
    fn test_large_offset_is_clamped() {
        let settings = TraySettings::from_config(
            &config(&[("tray-position", "left"), ("tray-offset-x", "40000"), ("tray-offset-y", "-40000")]),
            &bar(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(i16::MAX, settings.orig_x);
        assert_eq!(i16::MIN, settings.orig_y);
    }

    #[test]
    fn test_invalid_values() {
        assert!(TraySettings::from_config(&config(&[("tray-position", "left"), ("tray-background", "red")]), &bar()).is_err());
        assert!(TraySettings::from_config(&config(&[("tray-position", "left"), ("tray-offset-x", "5em")]), &bar()).is_err());
    }
}
