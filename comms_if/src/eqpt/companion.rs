//! # Companion Microcontroller Protocol
//!
//! The companion is a small microcontroller reading the side ranging sensors and the drive
//! encoder. It is driven with single byte commands over a serial link:
//!
//! | Byte  | Command | Response                                      |
//! |-------|---------|-----------------------------------------------|
//! | `'r'` | Read    | one line `left_mm,right_mm,encoder_mm\n`     |
//! | `'z'` | Reset   | none, encoder distance restarts from zero     |
//! | `'p'` | Pause   | none, the companion stops sampling            |

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One response frame to a [`CompanionCmd::Read`] request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompanionFrame {
    /// Distance to the left wall.
    ///
    /// Units: millimeters
    pub left_mm: f64,

    /// Distance to the right wall.
    ///
    /// Units: millimeters
    pub right_mm: f64,

    /// Distance travelled by the drive encoder since the last reset.
    ///
    /// Units: millimeters
    pub encoder_mm: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Commands accepted by the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanionCmd {
    /// Request a [`CompanionFrame`].
    Read,

    /// Reset the encoder distance and internal state.
    Reset,

    /// Pause sampling.
    Pause,
}

/// Reasons a response line could not be parsed into a [`CompanionFrame`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameParseError {
    #[error("Expected 3 comma separated fields, found {0}")]
    WrongFieldCount(usize),

    #[error("Field {index} ({value:?}) is not a number")]
    NotANumber { index: usize, value: String },

    #[error("Field {0} is not finite")]
    NotFinite(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CompanionCmd {
    /// The byte sent on the wire for this command.
    pub fn as_byte(self) -> u8 {
        match self {
            CompanionCmd::Read => b'r',
            CompanionCmd::Reset => b'z',
            CompanionCmd::Pause => b'p',
        }
    }

    /// True if the companion answers this command with a line.
    pub fn expects_response(self) -> bool {
        matches!(self, CompanionCmd::Read)
    }
}

impl FromStr for CompanionFrame {
    type Err = FrameParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();

        if fields.len() != 3 {
            return Err(FrameParseError::WrongFieldCount(fields.len()));
        }

        let mut values = [0f64; 3];
        for (index, field) in fields.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| FrameParseError::NotANumber {
                index,
                value: field.to_string(),
            })?;

            if !value.is_finite() {
                return Err(FrameParseError::NotFinite(index));
            }

            values[index] = value;
        }

        Ok(Self {
            left_mm: values[0],
            right_mm: values[1],
            encoder_mm: values[2],
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cmd_bytes() {
        assert_eq!(CompanionCmd::Read.as_byte(), b'r');
        assert_eq!(CompanionCmd::Reset.as_byte(), b'z');
        assert_eq!(CompanionCmd::Pause.as_byte(), b'p');
        assert!(CompanionCmd::Read.expects_response());
        assert!(!CompanionCmd::Reset.expects_response());
        assert!(!CompanionCmd::Pause.expects_response());
    }

    #[test]
    fn test_frame_parse() {
        let f: CompanionFrame = "200,350,1234\r\n".parse().unwrap();
        assert_eq!(
            f,
            CompanionFrame { left_mm: 200.0, right_mm: 350.0, encoder_mm: 1234.0 }
        );

        let f: CompanionFrame = " 12.5, 8 ,0".parse().unwrap();
        assert_eq!(f.left_mm, 12.5);
        assert_eq!(f.right_mm, 8.0);
    }

    #[test]
    fn test_frame_parse_malformed() {
        assert_eq!(
            "200,350".parse::<CompanionFrame>(),
            Err(FrameParseError::WrongFieldCount(2))
        );
        assert_eq!(
            "200,abc,1".parse::<CompanionFrame>(),
            Err(FrameParseError::NotANumber { index: 1, value: "abc".into() })
        );
        assert_eq!(
            "200,350,inf".parse::<CompanionFrame>(),
            Err(FrameParseError::NotFinite(2))
        );
        assert!("".parse::<CompanionFrame>().is_err());
    }
}
