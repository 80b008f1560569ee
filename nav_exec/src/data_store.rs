//! # Data Store
//!
//! The context owned by the run supervisor: every module instance and the data passed between
//! them during one cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::{
    act_ctrl,
    companion_client::CompanionReading,
    indicator::IndicatorState,
    loc::{LocMgr, Pose},
    mission::{Demand, MissionMgr},
    per::{PerMgr, Ranged},
    pid_ctrl::PidController,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// Clock time at which the current cycle started
    pub cycle_start_s: f64,

    /// Clock time of the start press
    pub run_start_s: f64,

    /// Clock time at which the previous cycle started, `None` on the first cycle
    pub last_cycle_start_s: Option<f64>,

    // Modules
    pub loc: LocMgr,
    pub per: PerMgr,
    pub pid: PidController,
    pub mission: MissionMgr,
    pub act_ctrl: act_ctrl::ActCtrl,

    // Cycle data
    pub companion: CompanionReading,
    pub front: Ranged,

    /// Companion cumulative encoder value at the last fresh read
    pub last_encoder_mm: Option<f64>,

    pub pose: Pose,
    pub demand: Demand,
    pub pid_output: f64,
    pub act_ctrl_input: act_ctrl::InputData,
    pub act_ctrl_output: Option<act_ctrl::OutputData>,

    /// Indicator state currently shown
    pub indicator: Option<IndicatorState>,

    // Monitoring counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DataStore {
    pub fn new(
        loc: LocMgr,
        per: PerMgr,
        mission: MissionMgr,
        act_ctrl: act_ctrl::ActCtrl,
    ) -> Self {
        Self {
            num_cycles: 0,
            cycle_start_s: 0.0,
            run_start_s: 0.0,
            last_cycle_start_s: None,
            loc,
            per,
            pid: PidController::new(),
            mission,
            act_ctrl,
            companion: CompanionReading::default(),
            front: Ranged::default(),
            last_encoder_mm: None,
            pose: Pose::default(),
            demand: Demand::stop(),
            pid_output: 0.0,
            act_ctrl_input: act_ctrl::InputData::default(),
            act_ctrl_output: None,
            indicator: None,
            num_consec_cycle_overruns: 0,
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Returns the time elapsed since the previous cycle started, zero on the first cycle.
    pub fn cycle_start(&mut self, now_s: f64) -> f64 {
        let dt_s = match self.last_cycle_start_s {
            Some(t) => now_s - t,
            None => 0.0,
        };

        self.last_cycle_start_s = Some(now_s);
        self.cycle_start_s = now_s;

        self.act_ctrl_input = act_ctrl::InputData::default();
        self.act_ctrl_output = None;

        dt_s
    }

    /// Time since the start press.
    pub fn run_elapsed_s(&self) -> f64 {
        self.cycle_start_s - self.run_start_s
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{mission::MissionProfile, per::PerParams};

    fn ds() -> DataStore {
        DataStore::new(
            LocMgr::new(0.0),
            PerMgr::new(PerParams { reference_column_px: 160.0 }),
            MissionMgr::new(MissionProfile::open()),
            act_ctrl::ActCtrl::default(),
        )
    }

    #[test]
    fn test_cycle_start_dt() {
        let mut ds = ds();
        assert_eq!(ds.cycle_start(5.0), 0.0);
        assert!((ds.cycle_start(5.02) - 0.02).abs() < 1e-12);

        ds.run_start_s = 4.0;
        assert!((ds.run_elapsed_s() - 1.02).abs() < 1e-12);
    }
}
