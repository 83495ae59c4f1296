//! Main motion executable entry point.
//!
//! # Architecture
//!
//! The executable runs a path on the simulated robot:
//!
//!     - Initialise the session, logger and parameters
//!     - Build the odometry, the drive base engines and the actuators
//!     - Main loop:
//!         - Drive base simulation
//!         - Path following
//!         - Actuator timeouts
//!         - Telemetry archiving
//!
//! Pass `--mirror` to run the path on the mirrored side of the table.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod follower;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::convert::TryFrom;
use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::tc::ActCommand;
use follower::{Follower, Progress};
use motion_lib::{
    actuator::{Actuators, AnalogServo, Motor, OnOff},
    engine::Engine,
    loc::{Axis, Odometry, OdometryAxis},
    path::{Path, PathParams},
    sim::{SimDrive, SimMotor, SimPin, SimServoDriver},
};
use params::{ActuatorsParams, MotionExecParams};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Limit of the number of consecutive cycle overruns before the execution is stopped.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 50;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Archived state of the drive base, one row per cycle.
#[derive(Serialize)]
struct DriveRecord {
    path_index: usize,
    x_mm: f64,
    y_mm: f64,
    orientation_deg: f64,
    linear_target: f64,
    linear_command: f64,
    angular_target: f64,
    angular_command: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session =
        Session::new("motion_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Motion Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    let mirror = env::args().skip(1).any(|a| a == "--mirror");

    // ---- LOAD PARAMETERS ----

    let params: MotionExecParams =
        util::params::load("motion_exec.toml").wrap_err("Could not load exec params")?;

    if params.cycle_period_ms == 0 {
        return Err(eyre!("The cycle period must be strictly positive"));
    }

    let path_params: PathParams =
        util::params::load("path.toml").wrap_err("Could not load the path")?;

    let mut path = Path::try_from(path_params).wrap_err("Invalid path")?;

    let mut initial_pose = params.initial_pose.pose();
    if mirror {
        info!("Mirroring the path");
        path.horizontal_mirror();
        initial_pose = initial_pose.horizontal_mirror();
    }

    info!("Exec parameters loaded, path of {} poses", path.len());

    // ---- INITIALISE THE DRIVE BASE ----

    let odometry = Arc::new(Odometry::new(params.odometry, initial_pose));
    let drive = SimDrive::new(params.sim_drive, odometry.clone());

    let mut linear = Engine::new(
        "linear",
        params.drive.linear.clone(),
        Box::new(drive.linear()),
        Box::new(OdometryAxis::new(odometry.clone(), Axis::Linear)),
    )
    .wrap_err("Could not create the linear engine")?;

    let mut angular = Engine::new(
        "angular",
        params.drive.angular.clone(),
        Box::new(drive.angular()),
        Box::new(OdometryAxis::new(odometry.clone(), Axis::Angular)),
    )
    .wrap_err("Could not create the angular engine")?;

    linear.start().wrap_err("Could not start the linear engine")?;
    angular.start().wrap_err("Could not start the angular engine")?;

    let mut follower = Follower::new(linear, angular, odometry.clone());

    // ---- INITIALISE THE ACTUATORS ----

    let mut actuators =
        build_actuators(&params.actuators).wrap_err("Could not build the actuators")?;

    info!("{} actuators initialised", actuators.len());
    for id in actuators.ids() {
        debug!("Actuator {} ready", id);
    }

    for cmd_str in params.startup_commands.iter() {
        match ActCommand::from_json(cmd_str) {
            // Rejected commands are logged by the registry
            Ok(cmd) => {
                actuators.dispatch(&cmd).ok();
            }
            Err(e) => warn!("Invalid startup command: {}", e),
        }
    }

    // ---- INITIALISE ARCHIVES ----

    let mut drive_archive =
        Archiver::from_path(&session, "drive.csv").wrap_err("Could not open the drive archive")?;
    let mut act_archive = Archiver::from_path(&session, "actuators.csv")
        .wrap_err("Could not open the actuators archive")?;

    info!("Initialisation complete\n");

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_millis(params.cycle_period_ms as u64);
    let start_instant = Instant::now();
    let cycles_per_second = (1000 / params.cycle_period_ms).max(1) as u64;
    let mut num_cycles = 0u64;
    let mut num_consec_cycle_overruns = 0u64;

    follower
        .start(path.current())
        .wrap_err("Could not start the path")?;

    loop {
        let cycle_start_instant = Instant::now();

        // ---- SIMULATION ----

        drive.tick();

        // ---- PATH FOLLOWING ----

        match follower
            .update(path.current())
            .wrap_err("Error while following the path")?
        {
            Progress::Moving => (),
            Progress::Reached => {
                info!("Pose {} reached", path.current_index());

                if path.is_finished() {
                    info!("End of the path reached, stopping");
                    break;
                }

                path.next();
                follower
                    .start(path.current())
                    .wrap_err("Could not start the next pose")?;
            }
            Progress::Failed(fault) => {
                error!("Pose {} unreachable ({:?})", path.current_index(), fault);

                if path.is_finished() {
                    info!("End of the path reached, stopping");
                    break;
                }

                path.unreachable();
                follower
                    .start(path.current())
                    .wrap_err("Could not start the next pose")?;
            }
        }

        // ---- ACTUATORS ----

        actuators.poll(Instant::now());

        // ---- ARCHIVING ----

        let pose = odometry.pose();
        let linear_status = follower.linear().status()?;
        let angular_status = follower.angular().status()?;

        let record = DriveRecord {
            path_index: path.current_index(),
            x_mm: pose.x(),
            y_mm: pose.y(),
            orientation_deg: pose.orientation_deg(),
            linear_target: linear_status.target,
            linear_command: linear_status.command_percent,
            angular_target: angular_status.target,
            angular_command: angular_status.command_percent,
        };

        if let Err(e) = drive_archive.serialise(&record) {
            warn!("Could not archive the drive state: {}", e);
        }

        let telemetry = actuators.telemetry();

        for state in telemetry.states.iter() {
            if let Err(e) = act_archive.serialise(state) {
                warn!("Could not archive the actuator state: {}", e);
            }
        }

        // Telemetry as handed to the protocol layer, once per second
        if num_cycles % cycles_per_second == 0 {
            match serde_json::to_string(&telemetry) {
                Ok(json) => debug!("Actuators: {}", json),
                Err(e) => warn!("Could not serialise the telemetry: {}", e),
            }
        }
        num_cycles += 1;

        // ---- CYCLE MANAGEMENT ----

        if params.max_duration_s > 0.0
            && start_instant.elapsed().as_secs_f64() > params.max_duration_s
        {
            info!("Maximum duration reached, stopping");
            break;
        }

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > MAX_CONSEC_CYCLE_OVERRUNS {
                    return Err(eyre!(
                        "More than {} consecutive cycle overruns",
                        MAX_CONSEC_CYCLE_OVERRUNS
                    ));
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    actuators
        .disable_all()
        .wrap_err("Could not disable the actuators")?;
    follower.stop().wrap_err("Could not stop the drive base")?;

    info!("End of execution");

    Ok(())
}

/// Build the actuators on simulated hardware and start their engines.
fn build_actuators(params: &ActuatorsParams) -> Result<Actuators, Report> {
    let mut actuators = Actuators::new();

    for motor_params in params.motors.iter() {
        let plant = SimMotor::new(params.sim_motor);
        let mut motor = Motor::new(
            motor_params.clone(),
            Box::new(plant.clone()),
            Box::new(plant),
        )?;
        motor.start()?;
        actuators.insert(Box::new(motor))?;
    }

    for on_off_params in params.on_offs.iter() {
        let on_off = OnOff::new(on_off_params.clone(), Box::new(SimPin::default()))?;
        actuators.insert(Box::new(on_off))?;
    }

    if !params.servos.is_empty() {
        let board = SimServoDriver::new(params.servo_board_channels).shared();

        for servo_params in params.servos.iter() {
            let servo = AnalogServo::new(servo_params.clone(), board.clone())?;
            actuators.insert(Box::new(servo))?;
        }
    }

    Ok(actuators)
}
