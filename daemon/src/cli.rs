use std::path::PathBuf;

use clap::Parser;

use crate::assign::PinAssignment;

/// Mirrors OBS per-source active state onto Raspberry Pi GPIO tally lights.
#[derive(Parser, Debug)]
#[command(name = "tally-daemon")]
#[command(about = "OBS tally light control via Raspberry Pi GPIO", long_about = None)]
#[command(version)]
pub struct Args {
    /// obs-websocket server address
    #[arg(short, long, value_name = "HOST:PORT")]
    pub connect: Option<String>,

    /// Assign a GPIO pin to a source (can be repeated)
    #[arg(short, long = "assign", value_name = "PIN=SOURCE")]
    pub assign: Vec<PinAssignment>,

    /// obs-websocket password, if the server requires one
    #[arg(short, long)]
    pub password: Option<String>,

    /// Optional TOML settings file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Service mode: reconnect forever instead of giving up
    #[arg(short, long)]
    pub daemon: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
