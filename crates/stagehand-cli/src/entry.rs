//! Container entrypoint: `stagehand-entry [-- [--no-block] [--verbose] [--] CMD...]`.
//!
//! Runs first-run and every-run hooks for every stage baked into the image,
//! then replaces itself with the custom entry, the given command, a login
//! shell, or `sleep infinity`.

use stagehand_runtime::{handoff, stdin, FsLedger, ProcessRunner, RuntimeError, StagePlans, Startup};
use stagehand_schema::paths::{ENV_GENERATED_DIR, ENV_STAGE, ENV_VERBOSE, GENERATED_DIR};
use stagehand_schema::StageId;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stagehand-entry: error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn current_stage() -> Result<StageId, RuntimeError> {
    match std::env::var(ENV_STAGE) {
        Ok(value) => value.parse().map_err(RuntimeError::InvalidStage),
        Err(_) => Err(RuntimeError::InvalidStage(format!("{ENV_STAGE} is not set"))),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run() -> Result<(), RuntimeError> {
    let argv: Vec<OsString> = std::env::args_os().skip(1).collect();
    let stage = current_stage()?;
    let generated =
        std::env::var_os(ENV_GENERATED_DIR).map_or_else(|| PathBuf::from(GENERATED_DIR), PathBuf::from);

    let plans = StagePlans::load(&generated, stage)?;
    let mut startup = Startup::new(plans, ProcessRunner::new(), FsLedger::from_env(), argv);

    let verbose = startup.resolve_options()?.verbose;
    if verbose {
        // Hook wrappers and child processes read the flag from the environment.
        std::env::set_var(ENV_VERBOSE, "1");
    }
    init_logging(verbose || std::env::var(ENV_VERBOSE).as_deref() == Ok("1"));
    info!("{stage} container starting");

    let report = startup.prepare()?;
    debug!("preparation: {report:?}");
    let action = startup.decide(stdin::detect(), handoff::login_shell())?;
    handoff::hand_off(&action)
}
