//! # Companion Client
//!
//! Requests side ranges and encoder distance from the companion microcontroller once per tick. A
//! late or malformed response never stalls the loop: the previous frame is kept and reported as
//! stale.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use comms_if::{
    eqpt::companion::{CompanionCmd, CompanionFrame},
    link::{Link, LinkError},
};
use log::{debug, warn};
use serde::Serialize;

use crate::per::Ranged;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Client for the companion microcontroller.
pub struct CompanionClient {
    link: Box<dyn Link>,

    /// Time to wait for a response to a read request
    timeout: Duration,

    /// Number of consecutive timeouts above which a warning is raised
    timeout_limit: u64,

    /// Last frame successfully parsed
    cached: Option<CompanionFrame>,

    /// Number of consecutive polls without a valid response
    num_consec_timeouts: u64,
}

/// Side ranges and encoder distance for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CompanionReading {
    pub left: Ranged,
    pub right: Ranged,

    /// Cumulative encoder distance since the last reset.
    pub encoder: Ranged,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CompanionClientError {
    #[error("Could not send {0:?} to the companion: {1}")]
    SendError(CompanionCmd, LinkError),

    #[error("Could not read the companion's response: {0}")]
    RecvError(LinkError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CompanionClient {
    pub fn new(link: Box<dyn Link>, timeout: Duration, timeout_limit: u64) -> Self {
        Self {
            link,
            timeout,
            timeout_limit,
            cached: None,
            num_consec_timeouts: 0,
        }
    }

    /// Request and read a frame.
    ///
    /// Only link failures are errors. A timeout, or a line which is not valid UTF-8 or does not
    /// parse, leaves the cached frame untouched and returns it marked stale.
    pub fn poll(&mut self) -> Result<CompanionReading, CompanionClientError> {
        // Drop anything left over from a response that arrived after its deadline
        self.link
            .discard_input()
            .map_err(CompanionClientError::RecvError)?;
        let line = self.transact(CompanionCmd::Read)?;

        let fresh = match line {
            Some(l) => match l.parse::<CompanionFrame>() {
                Ok(f) => {
                    self.cached = Some(f);
                    true
                }
                Err(e) => {
                    warn!("Malformed companion response {:?}: {}", l, e);
                    false
                }
            },
            None => false,
        };

        if fresh {
            self.num_consec_timeouts = 0;
        } else {
            self.num_consec_timeouts += 1;
            debug!("Companion read stale ({} consecutive)", self.num_consec_timeouts);

            if self.num_consec_timeouts == self.timeout_limit + 1 {
                warn!(
                    "Companion has not answered for more than {} consecutive requests",
                    self.timeout_limit
                );
            }
        }

        Ok(self.reading(!fresh))
    }

    /// Reset the companion's encoder distance.
    pub fn reset(&mut self) -> Result<(), CompanionClientError> {
        self.transact(CompanionCmd::Reset)?;

        if let Some(f) = self.cached.as_mut() {
            f.encoder_mm = 0.0;
        }

        Ok(())
    }

    /// Stop the companion sampling.
    pub fn pause(&mut self) -> Result<(), CompanionClientError> {
        self.transact(CompanionCmd::Pause).map(|_| ())
    }

    pub fn num_consec_timeouts(&self) -> u64 {
        self.num_consec_timeouts
    }

    /// Send a command and read its response line if it has one.
    ///
    /// A garbled line is dropped as if nothing had arrived.
    fn transact(&mut self, cmd: CompanionCmd) -> Result<Option<String>, CompanionClientError> {
        self.link
            .send(&[cmd.as_byte()])
            .map_err(|e| CompanionClientError::SendError(cmd, e))?;

        if !cmd.expects_response() {
            return Ok(None);
        }

        match self.link.read_line(self.timeout) {
            Ok(line) => Ok(line),
            Err(LinkError::NonUtf8Line) => {
                warn!("Companion sent a line which is not valid UTF-8, dropped");
                Ok(None)
            }
            Err(e) => Err(CompanionClientError::RecvError(e)),
        }
    }

    fn reading(&self, stale: bool) -> CompanionReading {
        let make = |mm: Option<f64>| Ranged { mm, stale };

        CompanionReading {
            left: make(self.cached.map(|f| f.left_mm)),
            right: make(self.cached.map(|f| f.right_mm)),
            encoder: make(self.cached.map(|f| f.encoder_mm)),
        }
    }
}
