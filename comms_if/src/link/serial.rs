//! Serial port [`Link`] implementation

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use serde::Deserialize;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::{Link, LinkError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum time a single read call blocks for, bounding how far past the caller's deadline a
/// `read_line` can run.
const READ_SLICE: Duration = Duration::from_millis(2);

/// Lines longer than this are discarded as noise.
const MAX_LINE_LEN: usize = 256;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of a serial link.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialLinkParams {
    /// Port path, for example `/dev/ttyACM0`
    pub port: String,

    /// Units: bits/second
    pub baud: u32,
}

/// A [`Link`] over an 8N1 serial port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,

    /// Bytes received but not yet returned as a line.
    line_buf: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SerialLink {
    /// Open the serial port described by `params`.
    pub fn open(params: &SerialLinkParams) -> Result<Self, LinkError> {
        let port = serialport::new(&params.port, params.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_SLICE)
            .open()
            .map_err(LinkError::OpenError)?;

        info!("Opened serial link {} at {} baud", params.port, params.baud);

        Ok(Self {
            port,
            line_buf: Vec::with_capacity(MAX_LINE_LEN),
        })
    }

    /// Take a complete line out of the buffer, if one is present.
    fn take_line(&mut self) -> Result<Option<String>, LinkError> {
        let end = match self.line_buf.iter().position(|b| *b == b'\n') {
            Some(i) => i,
            None => return Ok(None),
        };

        let mut line: Vec<u8> = self.line_buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line)
            .map(Some)
            .map_err(|_| LinkError::NonUtf8Line)
    }
}

impl Link for SerialLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        trace!("Serial link sent {:?}", bytes);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];

        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Some(line));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => {
                    self.line_buf.extend_from_slice(&chunk[..n]);

                    if self.line_buf.len() > MAX_LINE_LEN && !self.line_buf.contains(&b'\n') {
                        debug!("Discarding {} bytes of unterminated input", self.line_buf.len());
                        self.line_buf.clear();
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => (),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn discard_input(&mut self) -> Result<(), LinkError> {
        self.line_buf.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
