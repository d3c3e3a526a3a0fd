use std::process::ExitCode;

use tracing::{Level, error};

use quire::config::Config;
use quire::{lifecycle, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            // No level configured yet: report with the default one.
            let _ = logging::init(Level::INFO);
            error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = logging::init(config.log_level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
