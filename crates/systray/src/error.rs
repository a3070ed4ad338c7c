use thiserror::Error;
use x11rb::protocol::xproto::Window;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to get control of the systray selection")]
    AcquisitionFailed,
    #[error("Window {0:#x} does not exist")]
    BadWindow(Window),
    #[error("Invalid _XEMBED_INFO for window {0:#x}")]
    InvalidEmbedInfo(Window),
    #[error("{request} failed: {message}")]
    Request { request: &'static str, message: String },
    #[error("Invalid value {value:?} for config key {key}")]
    Config { key: String, value: String },
    #[error("Could not connect to the X server")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[error("X11 connection error")]
    Connection(#[from] x11rb::errors::ConnectionError),
}

impl Error {
    /// Errors caused by a client window that went away or was never valid.
    /// These evict the offending client instead of failing the tray.
    pub fn is_window_error(&self) -> bool {
        matches!(self, Error::BadWindow(_))
    }

    pub(crate) fn request(request: &'static str, message: impl Into<String>) -> Self {
        Error::Request { request, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
