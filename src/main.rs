use std::process::ExitCode;
use std::sync::Arc;

use syndicateiq::config::{self, Settings};
use syndicateiq::core_state::{CoreState, SWEEP_INTERVAL};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {e}", config::APP_NAME);
            return ExitCode::FAILURE;
        }
    };
    syndicateiq::init_tracing(settings.log_format);

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let addr = settings.bind_addr();
    let core = match CoreState::new(settings) {
        Ok(core) => Arc::new(core),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let sweeper = core.spawn_sweeper(SWEEP_INTERVAL);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Could not listen for shutdown signal");
        }
    };
    let served = syndicateiq::api::serve(core, addr, shutdown).await;
    sweeper.abort();
    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
