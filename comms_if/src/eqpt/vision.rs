//! # Vision Collaborator Interface
//!
//! Colour blob segmentation happens outside the controller. The controller only asks for the
//! blobs of one colour class inside a region of interest of the frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A rectangular region of the vision frame.
///
/// Units: pixels, origin at the top left of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A connected region of one colour class found in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// Horizontal position of the blob centroid in frame coordinates.
    ///
    /// Units: pixels
    pub centroid_x: f64,

    /// Number of pixels of the class inside the blob.
    pub pixel_count: u32,

    /// Area of the blob's bounding rectangle.
    ///
    /// Units: pixels
    pub area: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Colour classes the vision collaborator is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColourClass {
    /// Pillar passed on the right
    Red,

    /// Pillar passed on the left
    Green,

    /// Parking bay marker
    Magenta,

    /// Corner line met when travelling clockwise
    Orange,

    /// Corner line met when travelling counter-clockwise
    Blue,
}

/// Side on which an obstacle is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassSide {
    Left,
    Right,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Blob search capability of the vision collaborator.
pub trait VisionSource {
    /// Find every blob of `class` inside `roi` in the most recent frame.
    ///
    /// An empty list is a valid result and means the class is not visible.
    fn find_regions(&mut self, class: ColourClass, roi: &Roi) -> Result<Vec<Blob>, EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ColourClass {
    /// Side an obstacle of this colour must be passed on, for pillar classes.
    pub fn pass_side(self) -> Option<PassSide> {
        match self {
            ColourClass::Red => Some(PassSide::Right),
            ColourClass::Green => Some(PassSide::Left),
            _ => None,
        }
    }
}

impl Roi {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// True if the given horizontal position falls within the region's columns.
    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.x as f64 && x < self.x as f64 + self.w as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pass_side() {
        assert_eq!(ColourClass::Red.pass_side(), Some(PassSide::Right));
        assert_eq!(ColourClass::Green.pass_side(), Some(PassSide::Left));
        assert_eq!(ColourClass::Magenta.pass_side(), None);
        assert_eq!(ColourClass::Orange.pass_side(), None);
    }

    #[test]
    fn test_roi_contains() {
        let roi = Roi::new(40, 0, 240, 120);
        assert!(roi.contains_x(40.0));
        assert!(roi.contains_x(279.5));
        assert!(!roi.contains_x(280.0));
        assert!(!roi.contains_x(10.0));

        // Right edge past the end of the u32 range
        let roi = Roi::new(u32::MAX - 1, 0, 10, 10);
        assert!(roi.contains_x(u32::MAX as f64 + 5.0));
        assert!(!roi.contains_x(u32::MAX as f64 + 9.0));
    }
}
