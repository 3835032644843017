//! Main rover-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging, parameters and modules
//!     - Connect to the command agent and request movement
//!     - Main loop:
//!         - Move command reception and application
//!         - Control action processing (from a script, if given)
//!         - Motion processing:
//!             - Remote control: the body coasts at its velocity
//!             - Autonomous replay: NavCtrl drives the body along the waypoints
//!         - Archiving
//!     - Shut down the command client
//!
//! # Usage
//!
//! ```text
//! rov_exec [script]
//! ```
//!
//! Without a script the executable runs until killed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::{
    cmd::Request,
    ctrl::{ControlAction, ControlMode, CycleMode},
    net::NetParams,
};
use rov_lib::{
    cmd_client::CmdClient, cmd_processor, ctrl_processor, data_store::DataStore,
    params::RovExecParams, waypoint::WaypointStore,
};
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingActions, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("rov_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Rover Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: RovExecParams =
        util::params::load("rov_exec.toml").wrap_err("Could not load exec params")?;

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    if !exec_params.cycle_period_s.is_finite() || exec_params.cycle_period_s <= 0.0 {
        return Err(eyre!(
            "Expected a positive cycle period, found {} s",
            exec_params.cycle_period_s
        ));
    }
    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);

    // ---- LOAD SCRIPT ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let mut script = match args.len() {
        1 => {
            info!("No script provided, running until stopped\n");
            None
        }
        2 => {
            info!("Loading script from \"{}\"", &args[1]);

            let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} actions\n",
                si.get_duration(),
                si.get_num_actions()
            );

            Some(si)
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let sw_root = host::get_sw_root().wrap_err("Could not find the software root")?;
    let waypoint_path = exec_params.waypoint_path(&sw_root);
    info!("Waypoint file: {:?}", waypoint_path);

    let mut ds = DataStore::new(
        WaypointStore::from_path(waypoint_path),
        ControlMode::RemoteControl,
    );

    // ---- INITIALISE MODULES ----

    ds.nav_ctrl
        .init("nav_ctrl.toml", &session)
        .wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    if exec_params.control_mode == ControlMode::AutonomousReplay {
        info!("Starting in autonomous replay of the saved waypoints");

        let replay = ControlAction::Replay {
            mode: CycleMode::Loop,
            reload: true,
        };
        if let Err(e) = ctrl_processor::exec(&mut ds, &replay) {
            error!("Could not start replay, staying in remote control: {}", e);
        }
    }

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!(
        "Connecting to the command agent at {}:{}",
        net_params.cmd_host, net_params.cmd_port
    );

    let mut cmd_client = match CmdClient::connect(&net_params) {
        Ok(c) => {
            match c.send_request(&Request::Move) {
                Ok(_) => info!("Move requested from the command agent"),
                Err(e) => warn!("Could not request movement: {}", e),
            }
            Some(c)
        }
        Err(e) => {
            error!("{}, continuing without remote commands", e);
            None
        }
    };
    ds.remote_available = cmd_client.is_some();

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut last_cycle_start: Option<Instant> = None;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let dt_s = last_cycle_start
            .map(|t| (cycle_start_instant - t).as_secs_f64())
            .unwrap_or(0.0);
        last_cycle_start = Some(cycle_start_instant);

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(exec_params.cycle_frequency_hz(), session::get_elapsed_seconds());

        // ---- COMMAND PROCESSING ----

        if let Some(ref mut client) = cmd_client {
            let connected = client.is_connected();
            if ds.remote_available && !connected {
                error!("Connection to the command agent lost, continuing without remote commands");
            }
            ds.remote_available = connected;

            // Frames already queued are still applied after a disconnect
            let cmds = client.receive_cmds();
            cmd_processor::exec(&mut ds, &cmds);
        }

        // ---- CONTROL ACTION PROCESSING ----

        if let Some(ref mut si) = script {
            match si.get_pending_actions() {
                PendingActions::None => (),
                PendingActions::Some(actions) => {
                    for action in actions.iter() {
                        debug!("Executing {:?}", action);
                        if let Err(e) = ctrl_processor::exec(&mut ds, action) {
                            error!("Could not execute {:?}: {}", action, e);
                        }
                    }
                }
                // Exit if end of script reached
                PendingActions::EndOfScript => {
                    info!("End of script reached, stopping");
                    break;
                }
            }
        }

        // ---- MOTION PROCESSING ----

        if let Err(e) = ds.proc_motion(dt_s) {
            warn!("Error during motion processing: {}", e);
        }

        // ---- WRITE ARCHIVES ----

        if ds.nav_ctrl_output.is_some() {
            if let Err(e) = ds.nav_ctrl.write() {
                warn!("Could not archive NavCtrl: {}", e);
            }
        }

        if ds.is_1_hz_cycle {
            let pose = ds.body.pose();
            debug!(
                "{:?}: position {:?}, heading {:.3} rad",
                ds.control_mode,
                pose.position_m,
                pose.get_heading()
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;

                let limit = exec_params.max_consec_cycle_overruns;
                if limit > 0 && ds.num_consec_cycle_overruns > limit {
                    error!("More than {} consecutive cycle overruns, stopping", limit);
                    break;
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    if let Some(client) = cmd_client {
        info!(
            "Closing the command client ({} frames could not be decoded)",
            client.num_decode_failures()
        );
        client.shutdown();
    }

    info!("End of execution");

    Ok(())
}
