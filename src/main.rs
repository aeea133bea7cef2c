#[cfg(not(unix))]
compile_error!("jobsh drives processes with waitpid/kill and only builds on Unix");

mod builtins;
mod config;
mod error;
mod executor;
mod expander;
mod history;
mod job_control;
mod jobs;
mod parser;
mod pipeline;
mod redirect;
mod shell;
mod signals;
mod status;

use std::io::{self, Write};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config, LOG_ENV};
use crate::shell::Shell;

fn main() {
    let config = Config::from(Cli::parse());
    init_tracing(&config);

    ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    })
    .expect("Failed to set Ctrl-C handler");

    if let Err(err) = job_control::ignore_job_control_signals() {
        warn!(%err, "could not ignore terminal stop signals");
    }
    if config.debug {
        eprintln!("Debug mode activated.");
    }

    let mut shell = Shell::new(config);
    let exit_code = shell.run(&mut io::stdin().lock(), &mut io::stdout(), &mut io::stderr());
    shell.shutdown();

    std::process::exit(exit_code);
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
