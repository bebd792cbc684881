//! fgnhgd entry point.

use clap::Parser;
use log::info;
use sonic_orch_common::StateTable;
use sonic_sai::vs::VirtualSwitch;
use sonic_sai::SharedBackend;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fgnhgd::daemon::OrchDaemon;
use fgnhgd::STATE_FG_ROUTE_TABLE_NAME;

/// SONiC fine-grained ECMP next-hop group manager
#[derive(Parser, Debug)]
#[command(name = "fgnhgd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Start in warm-restart mode, recovering bucket state from the
    /// journal
    #[arg(short = 'w', long)]
    warm: bool,

    /// Dispatch interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_interval: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting fgnhgd");

    // The virtual switch backend serves the simulated platform; the
    // hardware SAI backend plugs in behind the same trait.
    let backend: SharedBackend = Arc::new(Mutex::new(VirtualSwitch::new()));
    let journal = Arc::new(Mutex::new(StateTable::new(STATE_FG_ROUTE_TABLE_NAME)));

    let mut daemon = OrchDaemon::new(backend, journal);
    if args.warm {
        info!("Warm restart: recovering journal state");
        if !daemon.warm_start() {
            log::error!("Warm restart recovery failed");
            return ExitCode::FAILURE;
        }
    }

    daemon.run(Duration::from_millis(args.tick_interval)).await;

    if daemon.fatal_failure() {
        ExitCode::FAILURE
    } else {
        daemon.teardown().await;
        ExitCode::SUCCESS
    }
}
