use clap::Parser;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "JOBSH_LOG";

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "jobsh", version, about = "Interactive shell with job control and pipelines")]
pub struct Cli {
    /// Print each spawned PID and program, and log process lifecycle at debug level
    #[arg(short, long)]
    pub debug: bool,

    /// Built-in that stops a process (SIGSTOP)
    #[arg(long, default_value = "zzzz")]
    pub suspend_name: String,

    /// Built-in that resumes a process (SIGCONT)
    #[arg(long, default_value = "kuku")]
    pub continue_name: String,

    /// Built-in that interrupts a process (SIGINT)
    #[arg(long, default_value = "blast")]
    pub interrupt_name: String,
}

/// Immutable shell settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub debug: bool,
    pub suspend_name: String,
    pub continue_name: String,
    pub interrupt_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            suspend_name: "zzzz".into(),
            continue_name: "kuku".into(),
            interrupt_name: "blast".into(),
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            debug: cli.debug,
            suspend_name: cli.suspend_name,
            continue_name: cli.continue_name,
            interrupt_name: cli.interrupt_name,
        }
    }
}

impl Config {
    /// Filter used when `JOBSH_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "warn" }
    }
}
