//! # Vehicle platform
//!
//! The set of collaborators a run is given: sensors, actuators, the companion link, the status
//! indicator and the edge triggered inputs. On the vehicle these are hardware drivers, on the host
//! they come from [`sim::SimWorld`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use comms_if::{
    eqpt::{
        actuator::{DriveMotor, SteeringServo},
        board::{Indicator, PowerCtrl},
        imu::RateGyro,
        ranging::RangeSensor,
        vision::VisionSource,
    },
    link::Link,
};
use util::time::Clock;

use crate::edge::{EncoderCounter, StartLatch};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Collaborators of one run.
pub struct Vehicle {
    pub clock: Arc<dyn Clock>,

    pub gyro: Box<dyn RateGyro>,

    /// Forward ranging sensor, not fitted to every vehicle.
    pub front: Option<Box<dyn RangeSensor>>,

    pub vision: Box<dyn VisionSource>,

    /// Link to the companion microcontroller
    pub companion: Box<dyn Link>,

    pub servo: Box<dyn SteeringServo>,
    pub drive: Box<dyn DriveMotor>,
    pub indicator: Box<dyn Indicator>,
    pub power: Box<dyn PowerCtrl>,

    /// Written by the encoder edge handler
    pub encoder: Arc<EncoderCounter>,

    /// Written by the start button edge handler
    pub start: Arc<StartLatch>,
}
