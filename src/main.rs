use std::sync::Arc;

use colored::Colorize;
use driftline_collab::Collab;
use driftline_core::Config;
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

struct Driftline {
    config: Config,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum DriftlineError {
    #[error("Could not build async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Server stopped: {0}")]
    Server(std::io::Error),
}

impl Driftline {
    fn new() -> Result<Self, DriftlineError> {
        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("driftline-async")
            .build()
            .map_err(DriftlineError::Runtime)?;

        let config = Config::from_env();

        if config.rtc_certificate.is_none() {
            warn!("DRIFTLINE_RTC_CERTIFICATE is not set, no tokens can be issued");
        }

        match &config.mirror_url {
            Some(url) => info!("Mirroring sessions to {}", url),
            None => info!("No mirror configured, sessions are kept in memory only"),
        }

        Ok(Self { config, runtime })
    }

    fn run(self) -> Result<(), DriftlineError> {
        let Self { config, runtime } = self;

        runtime.block_on(async move {
            let collab = Arc::new(Collab::from_config(config));
            collab.rooms.spawn_sweeper();

            driftline_server::run_server(collab)
                .await
                .map_err(DriftlineError::Server)
        })
    }
}

impl DriftlineError {
    fn hint(&self) -> String {
        match self {
            DriftlineError::Runtime(_) => {
                "The async runtime could not start. Check the limits on threads for this process."
                    .to_string()
            }
            DriftlineError::Server(_) => {
                "Make sure DRIFTLINE_SERVER_PORT points at a free port, then try again.".to_string()
            }
        }
    }
}

fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", e);
    }

    let result = Driftline::new().and_then(|driftline| {
        info!("Initialized successfully.");
        driftline.run()
    });

    if let Err(error) = result {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "Driftline stopped!".bold().red()
        );
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
