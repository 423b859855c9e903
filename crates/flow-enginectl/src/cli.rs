use clap::Parser;

/// Flow engine control-plane daemon.
#[derive(Parser, Debug)]
#[command(name = "flow-enginectl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML config file (falls back to environment variables, then
    /// built-in defaults; spec.md §6).
    #[arg(long, short = 'c', env = "FLOW_ENGINE_CONFIG")]
    pub config: Option<std::path::PathBuf>,
}
