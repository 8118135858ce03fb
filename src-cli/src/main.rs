//! macrotoggle: toggle an input macro on and off with a global hotkey.
//!
//! Usage: `macrotoggle [CONFIG]`. Without an argument the configuration is
//! looked up as `./macros.json`, then `<config dir>/macrotoggle/macros.json`.

use macrotoggle_core::{
    candidate_config_paths, find_config, ConfigError, MacroConfig, MacroRunner, RunnerEvent,
    TriggerError, TriggerSource,
};
use macrotoggle_platform::{create_backend, start_key_hook, PlatformError};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error("no configuration found (looked in {0})")]
    ConfigNotFound(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "macrotoggle=info,macrotoggle_core=info,macrotoggle_platform=info".into()
            }),
        )
        .try_init();
}

fn log_event(event: &RunnerEvent) {
    match event {
        RunnerEvent::StateChanged { old, new } => debug!(%old, %new, "Macro state changed"),
        RunnerEvent::IterationCompleted { iteration } => debug!(iteration, "Loop pass done"),
        RunnerEvent::Completed => info!("Macro finished"),
        RunnerEvent::Failed { index, message } => {
            error!(step = index, %message, "Macro aborted")
        }
        RunnerEvent::ReleaseFailures { count } => {
            warn!(count, "Some held inputs could not be released")
        }
    }
}

fn run() -> Result<(), AppError> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let path = find_config(explicit).ok_or_else(|| {
        let looked = candidate_config_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::ConfigNotFound(looked)
    })?;

    let config = MacroConfig::load(&path)?;
    let backend = create_backend(config.backend)?;

    let runner = MacroRunner::new(config.definition, backend);
    runner.set_observer(log_event);

    let hook = start_key_hook();
    let source = TriggerSource::new(config.trigger, runner.clone());
    info!(config = %path.display(), "Ready");

    let quit_runner = runner.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        if let Err(e) = quit_runner.request_quit() {
            warn!(error = %e, "Quit request ignored");
        }
    })?;

    let result = source.run(hook.events());
    if result.is_err() && !hook.is_running() {
        error!("Key hook thread exited; check input access permissions");
    }

    hook.stop();
    runner.shutdown();
    info!("Exiting");

    result.map_err(AppError::from)
}

fn main() -> ExitCode {
    init_logging();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
