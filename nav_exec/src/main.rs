//! Navigation executable entry point.
//!
//! # Architecture
//!
//! - Create the session and logger
//! - Load the exec, actuator, localisation and perception parameters, and the mission profile
//! - Build the vehicle collaborators, on the host this is the simulated vehicle, optionally with
//!   the real companion microcontroller attached over a serial port
//! - Hand everything to the [`Supervisor`] which runs the mission to its end and halts the vehicle

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;

use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use structopt::StructOpt;

// Internal
use comms_if::link::{SerialLink, SerialLinkParams};
use nav_lib::{
    act_ctrl,
    loc::LocParams,
    mission::MissionProfile,
    params::NavExecParams,
    per::PerParams,
    platform::sim::{SimEvent, SimParams, SimWorld},
    supervisor::{RunConfig, RunOutcome, Supervisor},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Delay between the end of the gyro calibration and the simulated start press.
const SIM_START_DELAY_S: f64 = 0.5;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec", about = "Autonomous course navigation executable")]
struct Opt {
    /// Mission profile, either a built in name (`obstacle`, `open`), the name of a file in
    /// `params/profiles`, or a path to a profile TOML file.
    #[structopt(short, long, default_value = "obstacle")]
    profile: String,

    /// Directory holding the parameter files, `params` under the software root if not given.
    #[structopt(long, parse(from_os_str))]
    params_dir: Option<PathBuf>,

    /// Serial port of the companion microcontroller. The simulated companion is used if not
    /// given.
    #[structopt(long)]
    companion: Option<String>,

    /// Baud rate of the companion serial port.
    #[structopt(long, default_value = "115200")]
    baud: u32,

    /// Override of the forced run timeout.
    ///
    /// Units: seconds
    #[structopt(long)]
    max_run_s: Option<f64>,

    /// Minimum level of the log, `info` or more verbose.
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Course Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut exec: NavExecParams =
        load_params(&opt, "nav_exec.toml").wrap_err("Could not load exec params")?;
    if let Some(max_run_s) = opt.max_run_s {
        exec.max_run_s = max_run_s;
    }
    exec.validate().wrap_err("Invalid exec params")?;

    let act_params: act_ctrl::Params =
        load_params(&opt, "act_ctrl.toml").wrap_err("Could not load ActCtrl params")?;
    let loc: LocParams = load_params(&opt, "loc.toml").wrap_err("Could not load Loc params")?;
    let per: PerParams = load_params(&opt, "per.toml").wrap_err("Could not load Per params")?;

    let profile = load_profile(&opt).wrap_err("Could not load the mission profile")?;

    info!("Parameters loaded, mission profile \"{}\"", profile.name);

    // ---- BUILD THE VEHICLE ----

    let mut sim_params = SimParams::new(act_params.clone());
    sim_params.start_debounce_s = exec.start_debounce_s;
    sim_params.mm_per_tick = exec.mm_per_tick;
    let world = SimWorld::new(sim_params);

    // Press start once the gyro calibration is over
    let calib_s = (loc.calib.max_samples as f64 * loc.calib.sample_period_s)
        .min(loc.calib.max_duration_s);
    world.schedule(calib_s + SIM_START_DELAY_S, SimEvent::PressStart);

    let mut vehicle = world.vehicle();

    if let Some(port) = &opt.companion {
        let link = SerialLink::open(&SerialLinkParams {
            port: port.clone(),
            baud: opt.baud,
        })
        .wrap_err_with(|| format!("Could not open the companion port {}", port))?;
        vehicle.companion = Box::new(link);
        info!("Companion connected on {} at {} baud", port, opt.baud);
    } else {
        info!("Using the simulated companion");
    }

    let archiver = match Archiver::from_path(&session, "ticks.csv") {
        Ok(a) => Some(a),
        Err(e) => {
            warn!("Tick archive disabled: {}", e);
            None
        }
    };

    // ---- RUN ----

    let config = RunConfig {
        exec,
        act_ctrl: act_params,
        loc,
        per,
        profile,
    };

    let supervisor =
        Supervisor::new(vehicle, config, archiver).wrap_err("Could not initialise the run")?;

    let report = supervisor.run();

    info!(
        "Run ended: {:?} after {} cycles in {:?}, {} corners",
        report.outcome, report.num_cycles, report.last_phase, report.corners
    );

    match (report.outcome, report.fault) {
        (_, Some(fault)) => Err(eyre!("Run ended by a fault: {}", fault)),
        (RunOutcome::TimedOut, None) => Err(eyre!("Run timed out before the mission completed")),
        _ => Ok(()),
    }
}

/// Load a parameter file from the `--params-dir` if given, otherwise from the software root.
fn load_params<P>(opt: &Opt, file: &str) -> Result<P, util::params::LoadError>
where
    P: serde::de::DeserializeOwned,
{
    match &opt.params_dir {
        Some(dir) => util::params::load_path(dir.join(file)),
        None => util::params::load(file),
    }
}

/// Resolve the `--profile` option into a mission profile.
fn load_profile(opt: &Opt) -> Result<MissionProfile, Report> {
    let profile = if opt.profile.ends_with(".toml") {
        util::params::load_path(&opt.profile)?
    } else {
        match load_params(opt, &format!("profiles/{}.toml", opt.profile)) {
            Ok(p) => p,
            Err(e) => match opt.profile.as_str() {
                "obstacle" => {
                    warn!("Using the built in obstacle profile: {}", e);
                    MissionProfile::obstacle()
                }
                "open" => {
                    warn!("Using the built in open profile: {}", e);
                    MissionProfile::open()
                }
                _ => return Err(e.into()),
            },
        }
    };

    Ok(profile)
}
