//! # Board Level Interfaces
//!
//! Status indicator LED and power control of the controller board.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State of the three channels of an RGB indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// One-way tri-colour status indicator.
pub trait Indicator {
    fn set_colour(&mut self, colour: Rgb) -> Result<(), EqptError>;
}

/// Board power management.
pub trait PowerCtrl {
    /// Enter the low power halt. On target this does not return until the board is reset.
    fn standby(&mut self) -> Result<(), EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Rgb {
    pub const OFF: Rgb = Rgb { red: false, green: false, blue: false };
    pub const RED: Rgb = Rgb { red: true, green: false, blue: false };
    pub const GREEN: Rgb = Rgb { red: false, green: true, blue: false };
    pub const BLUE: Rgb = Rgb { red: false, green: false, blue: true };
    pub const WHITE: Rgb = Rgb { red: true, green: true, blue: true };
}
