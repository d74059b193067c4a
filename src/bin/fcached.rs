//! Server entry point: parse configuration, build the store, and run until a shutdown signal
//! arrives (spec.md §4.7, §6).

use std::process::ExitCode;

use fcached::{Server, ServerConfig};

fn main() -> ExitCode {
    fcached::logging::init_diagnostics();

    let config = match ServerConfig::load_from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fcached: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "starting fcached: socket_path={} max_files={} max_bytes={} workers={} \
         replacement_policy={} log_path={}",
        config.socket_path.display(),
        config.max_files,
        config.max_bytes,
        config.workers,
        config.replacement_policy,
        config.log_path.display(),
    );

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("fcached: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}
