//! # Equipment Links
//!
//! Line oriented byte links to equipment. The companion microcontroller is reached over a
//! [`SerialLink`], tests and the host simulation substitute their own [`Link`] implementors.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod serial;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

pub use serial::{SerialLink, SerialLinkParams};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A bidirectional byte link carrying newline terminated responses.
pub trait Link {
    /// Write all of `bytes` to the link.
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Read one line from the link, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` if no complete line arrived in time. The line terminator is not
    /// included in the returned string.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError>;

    /// Drop any bytes already received but not yet read.
    fn discard_input(&mut self) -> Result<(), LinkError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by a [`Link`].
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Could not open the serial port: {0}")]
    OpenError(serialport::Error),

    #[error("Serial port error: {0}")]
    PortError(#[from] serialport::Error),

    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Received a line which was not valid UTF-8")]
    NonUtf8Line,

    #[error("The link is closed")]
    Closed,
}
