//! # Perception module
//!
//! Normalises what the vision and ranging collaborators report into detection events and ranged
//! distances. Nothing here fails: an unavailable collaborator shows up as an absent detection or a
//! stale range, and the mission decides what to do about it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::{
    ranging::RangeSensor,
    vision::{Blob, ColourClass, Roi, VisionSource},
};
use log::{trace, warn};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of detection events, queried by the mission for the classes it currently needs.
pub trait Observer {
    fn detect(&mut self, class: ColourClass, roi: &Roi) -> Detection;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PerParams {
    /// Frame column against which horizontal errors are measured, normally the image centre.
    ///
    /// Units: pixels
    pub reference_column_px: f64,
}

/// Result of one detection query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub class: ColourClass,

    /// Offset of the selected blob's centroid from the reference column, positive to the right.
    /// Zero when not present.
    ///
    /// Units: pixels
    pub center_error_px: f64,

    pub present: bool,
}

/// A distance reading which may be out of date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Ranged {
    /// Last value read, `None` if the sensor has never answered.
    ///
    /// Units: millimeters
    pub mm: Option<f64>,

    /// True if this tick's read failed and `mm` is the previous value.
    pub stale: bool,
}

/// Perception manager.
#[derive(Debug, Clone)]
pub struct PerMgr {
    params: PerParams,

    /// Last good front range
    last_front_mm: Option<f64>,
}

/// Binds the perception manager to a vision collaborator for the duration of a tick.
pub struct VisionObserver<'a> {
    pub per: &'a PerMgr,
    pub vision: &'a mut dyn VisionSource,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Detection {
    pub fn absent(class: ColourClass) -> Self {
        Self {
            class,
            center_error_px: 0.0,
            present: false,
        }
    }
}

impl Ranged {
    pub fn fresh(mm: f64) -> Self {
        Self {
            mm: Some(mm),
            stale: false,
        }
    }

    /// The value, only if it was read this tick.
    pub fn current(&self) -> Option<f64> {
        match self.stale {
            true => None,
            false => self.mm,
        }
    }

    /// Keep the value but mark it out of date.
    pub fn into_stale(self) -> Self {
        Self {
            mm: self.mm,
            stale: true,
        }
    }
}

impl PerMgr {
    pub fn new(params: PerParams) -> Self {
        Self {
            params,
            last_front_mm: None,
        }
    }

    /// Search for `class` in `roi` and report the largest match.
    ///
    /// The largest blob by area is selected, ties going to the highest pixel count, so that small
    /// spurious regions do not make the error flicker.
    pub fn detect(
        &self,
        vision: &mut dyn VisionSource,
        class: ColourClass,
        roi: &Roi,
    ) -> Detection {
        let blobs = match vision.find_regions(class, roi) {
            Ok(b) => b,
            Err(e) => {
                warn!("Vision query for {:?} failed, treated as absent: {}", class, e);
                return Detection::absent(class);
            }
        };

        match select_blob(&blobs) {
            Some(b) => {
                let d = Detection {
                    class,
                    center_error_px: b.centroid_x - self.params.reference_column_px,
                    present: true,
                };
                trace!("{:?} present, error {:.1} px ({} blobs)", class, d.center_error_px, blobs.len());
                d
            }
            None => Detection::absent(class),
        }
    }

    /// Read the front range sensor, falling back on the last good value if it fails.
    pub fn read_front(&mut self, sensor: &mut dyn RangeSensor) -> Ranged {
        match sensor.read_mm() {
            Ok(mm) if mm.is_finite() && mm >= 0.0 => {
                self.last_front_mm = Some(mm);
                Ranged::fresh(mm)
            }
            Ok(mm) => {
                warn!("Discarding invalid front range {}", mm);
                Ranged { mm: self.last_front_mm, stale: true }
            }
            Err(e) => {
                warn!("Front range read failed: {}", e);
                Ranged { mm: self.last_front_mm, stale: true }
            }
        }
    }
}

impl<'a> Observer for VisionObserver<'a> {
    fn detect(&mut self, class: ColourClass, roi: &Roi) -> Detection {
        self.per.detect(self.vision, class, roi)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn select_blob(blobs: &[Blob]) -> Option<&Blob> {
    blobs
        .iter()
        .max_by(|a, b| a.area.cmp(&b.area).then(a.pixel_count.cmp(&b.pixel_count)))
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::EqptError;

    struct FixedVision(Result<Vec<Blob>, ()>);

    impl VisionSource for FixedVision {
        fn find_regions(&mut self, _: ColourClass, _: &Roi) -> Result<Vec<Blob>, EqptError> {
            self.0.clone().map_err(|_| EqptError::Bus("spi".into()))
        }
    }

    struct SeqRange(Vec<Result<f64, ()>>);

    impl RangeSensor for SeqRange {
        fn read_mm(&mut self) -> Result<f64, EqptError> {
            self.0.remove(0).map_err(|_| EqptError::Timeout)
        }
    }

    fn blob(x: f64, pixel_count: u32, area: u32) -> Blob {
        Blob { centroid_x: x, pixel_count, area }
    }

    fn per() -> PerMgr {
        PerMgr::new(PerParams { reference_column_px: 160.0 })
    }

    const ROI: Roi = Roi { x: 0, y: 0, w: 320, h: 240 };

    #[test]
    fn test_largest_blob_selected() {
        let mut v = FixedVision(Ok(vec![
            blob(40.0, 300, 400),
            blob(250.0, 500, 900),
            blob(100.0, 600, 900),
            blob(10.0, 50, 60),
        ]));

        let d = per().detect(&mut v, ColourClass::Red, &ROI);
        assert!(d.present);
        // Area tie broken by pixel count
        assert_eq!(d.center_error_px, 100.0 - 160.0);
    }

    #[test]
    fn test_absent() {
        let mut v = FixedVision(Ok(vec![]));
        assert_eq!(
            per().detect(&mut v, ColourClass::Green, &ROI),
            Detection::absent(ColourClass::Green)
        );

        let mut v = FixedVision(Err(()));
        let d = per().detect(&mut v, ColourClass::Green, &ROI);
        assert!(!d.present);
        assert_eq!(d.center_error_px, 0.0);
    }

    #[test]
    fn test_front_keeps_last_value_when_stale() {
        let mut per = per();
        let mut s = SeqRange(vec![Err(()), Ok(420.0), Err(()), Ok(f64::NAN), Ok(380.0)]);

        assert_eq!(per.read_front(&mut s), Ranged { mm: None, stale: true });
        assert_eq!(per.read_front(&mut s), Ranged::fresh(420.0));

        let r = per.read_front(&mut s);
        assert_eq!(r, Ranged { mm: Some(420.0), stale: true });
        assert_eq!(r.current(), None);

        assert_eq!(per.read_front(&mut s), Ranged { mm: Some(420.0), stale: true });
        assert_eq!(per.read_front(&mut s).current(), Some(380.0));
    }
}
