use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::mpsc;

use servicebroker::controller::{configure, Clients, ConfigStore, DirectoryWatch};
use servicebroker::{logging, resolve_settings, ControllerError, ControllerSettings};

/// How often readiness is sampled for transition logging.
const READINESS_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = match resolve_settings(settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&settings.log) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Starting servicebroker-controller v{}",
        env!("CARGO_PKG_VERSION")
    );
    log::debug!("Settings: {:?}", settings);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: ControllerSettings) -> Result<(), ControllerError> {
    let token = settings.token_sources().resolve()?;

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    info!(
        "Watching {} for service broker configuration in namespace '{}'",
        settings.config_directory.display(),
        settings.namespace
    );
    let watch = DirectoryWatch::new(&settings.config_directory, settings.namespace.clone());
    let clients = Clients::new(Arc::new(watch.status_writer()));

    let controller = configure(
        clients,
        settings.namespace.clone(),
        token,
        Arc::new(watch),
        settings.controller_options(),
    )
    .await?;

    let store = controller.store();
    let mut ready = store.is_ready().await;
    let mut ticker = tokio::time::interval(READINESS_INTERVAL);

    let result = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown requested");
                break Ok(());
            }
            _ = ticker.tick() => {
                if !controller.is_running() {
                    break Err(ControllerError::WatchStopped);
                }
                ready = log_readiness(&store, ready).await;
            }
        }
    };

    controller.stop().await;
    result
}

/// Logs when readiness differs from `previous` and returns the current value.
async fn log_readiness(store: &ConfigStore, previous: bool) -> bool {
    let ready = store.is_ready().await;
    if ready != previous {
        if ready {
            info!("Service broker is ready");
        } else {
            log::warn!("Service broker is not ready, no valid configuration");
        }
    }
    ready
}
