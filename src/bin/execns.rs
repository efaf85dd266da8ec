use std::process;

use execns::{cli, Executor};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "EXECNS_LOG";

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    // stdout belongs to the command; stderr is usually captured by whoever
    // launched us, so no colour codes.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn main() {
    // Usage errors exit with status 1, the code reserved for bad input.
    let matches = cli::app().get_matches();
    init_logging(matches.is_present("verbose"));

    let result = cli::request_from(&matches).and_then(|request| Executor::new().run(&request));
    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("execns: {}", err);
            process::exit(err.exit_code());
        }
    }
}
