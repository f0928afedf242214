use std::process::ExitCode;

use simple_tcp::{LaunchError, run_server};
use simple_tcp_config::ConfigError;

fn main() -> ExitCode {
    match run_server() {
        Ok(reason) => ExitCode::from(reason.exit_code()),
        Err(LaunchError::Config {
            source: ConfigError::Arguments(error),
        }) => {
            let _ = error.print();
            if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            eprintln!("simple-tcp: {error}");
            ExitCode::FAILURE
        }
    }
}
