//! Pseudo-transparency: the container's background is a copy of the part of the root window
//! background it covers.

use x11rb::protocol::xproto::{Gcontext, Pixmap};

use crate::{backend::Backend, embed::Atoms, Rect, Result};

/// The pixmap currently used as the desktop background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootPixmap {
    pub pixmap: Pixmap,
    pub geometry: Rect,
}

/// Where the container's background is rendered and the area it covers on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundTarget {
    pub pixmap: Pixmap,
    pub gc: Gcontext,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// Clip the area at `x`/`y` to the bounds of the root pixmap so no undefined content is read.
pub fn clip_source_rect(root: Rect, x: i16, y: i16, width: u16, height: u16) -> Rect {
    let px = (root.x as i32 + x as i32).max(0);
    let py = (root.y as i32 + y as i32).max(0);
    let width = (width as i32).min(root.width as i32 - px).max(0);
    let height = (height as i32).min(root.height as i32 - py).max(0);
    Rect::new(px as i16, py as i16, width as u16, height as u16)
}

/// Look up the root background pixmap set by the desktop background setter, if any.
pub fn find_root_pixmap(backend: &dyn Backend, atoms: &Atoms) -> Result<Option<RootPixmap>> {
    for property in [atoms._XROOTPMAP_ID, atoms.ESETROOT_PMAP_ID] {
        let data = backend.get_property32(backend.root(), property)?;
        if let Some(&pixmap) = data.first().filter(|&&pixmap| pixmap != x11rb::NONE) {
            let geometry = backend.get_geometry(pixmap)?;
            return Ok(Some(RootPixmap { pixmap, geometry }));
        }
    }
    Ok(None)
}

#[derive(Debug, Default)]
pub struct BackgroundCompositor {
    root: Option<RootPixmap>,
    prev_width: u16,
    prev_height: u16,
}

impl BackgroundCompositor {
    pub fn has_root_pixmap(&self) -> bool {
        self.root.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget the captured root pixmap so the next refresh reads the background again.
    pub fn invalidate(&mut self) {
        self.root = None;
    }

    /// Update the container background. The root pixmap is only read again when `force` is set,
    /// when none is known yet, or when the container changed its size.
    pub fn refresh(&mut self, backend: &dyn Backend, atoms: &Atoms, target: &BackgroundTarget, force: bool) -> Result<()> {
        let recapture = force || self.root.is_none();
        let unchanged = target.width == self.prev_width && target.height == self.prev_height;
        if (target.width == 0 || unchanged) && !recapture {
            return Ok(());
        }

        log::trace!("tray: Reconfigure bg (realloc={})", recapture);

        if recapture {
            match find_root_pixmap(backend, atoms) {
                Ok(Some(root)) => {
                    log::info!(
                        "Tray root pixmap (rootpmap={:#x}, geom={}, pmap={:#x}, gc={:#x})",
                        root.pixmap,
                        root.geometry,
                        target.pixmap,
                        target.gc
                    );
                    self.root = Some(root);
                }
                Ok(None) => {
                    log::error!("Failed to get root pixmap for tray background (realloc={})", force);
                    self.root = None;
                    return Ok(());
                }
                Err(err) => {
                    self.root = None;
                    return Err(err);
                }
            }
        }
        let Some(root) = self.root else {
            return Ok(());
        };

        self.prev_width = target.width;
        self.prev_height = target.height;

        let area = clip_source_rect(root.geometry, target.x, target.y, target.width, target.height);
        if area.is_empty() {
            return Ok(());
        }

        if recapture {
            let image = backend.get_image(root.pixmap, area)?;
            backend.put_image(target.pixmap, target.gc, area.width, area.height, &image)?;
        }
        backend.copy_area(root.pixmap, target.pixmap, target.gc, area)
    }
}
