//! hushcheck - Run a static type checker with its routine chatter filtered out.

use std::ffi::OsString;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hushcheck::checker::Invocation;
use hushcheck::config::ConfigLoader;
use hushcheck::display::print_error;
use hushcheck::output::StdSink;
use hushcheck::supervisor::{Interrupts, Supervisor, EXIT_CONFIG_ERROR};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "HUSHCHECK_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    // Every argument, `--help`, `--` and non-UTF-8 paths included, belongs
    // to the checker.
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    std::process::exit(run(args).await);
}

async fn run(args: Vec<OsString>) -> i32 {
    let mut config = match ConfigLoader::from_env().load() {
        Ok(config) => config,
        Err(e) => {
            print_error(&e);
            return EXIT_CONFIG_ERROR;
        }
    };
    config.apply_env();

    let invocation = Invocation::from_config(&config, args);

    let interrupts = match Interrupts::listen() {
        Ok(interrupts) => interrupts,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install interruption handlers");
            Interrupts::none()
        }
    };

    let mut supervisor = match Supervisor::from_config(&config, Arc::new(StdSink)) {
        Ok(supervisor) => supervisor.with_interrupts(interrupts),
        Err(e) => {
            print_error(format_args!("invalid filter rule: {e}"));
            return EXIT_CONFIG_ERROR;
        }
    };

    match supervisor.run(&invocation).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            print_error(&e);
            e.exit_code()
        }
    }
}
