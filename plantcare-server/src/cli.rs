// plantcare-server/src/cli.rs
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// PlantCare: crop management API with a chat assistant.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to PlantCare.toml. Defaults to searching the current directory
    /// and its parents.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on. Overrides `[server].port` and the PORT variable.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind. Overrides `[server].host`.
    #[arg(long)]
    pub host: Option<String>,
}
