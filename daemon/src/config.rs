use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::assign::PinAssignment;
use crate::cli::Args;

/// Default obs-websocket address (the port obs-websocket listens on out of
/// the box).
pub const DEFAULT_CONNECT: &str = "localhost:4455";

/// Schema of the optional `--config` TOML file.
///
/// Everything in it can also be given on the command line; flags win over
/// file values, and `-a` assignments extend the file's list.
///
/// ```toml
/// connect = "studio-pi:4455"
/// password = "hunter2"
///
/// [[assignments]]
/// pin = 11
/// source = "camera 1"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub connect: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub daemon: bool,
    #[serde(default)]
    pub assignments: Vec<PinAssignment>,
}

/// Reads and parses the settings file at `path`. Unlike an implicit default
/// path, an explicitly requested file that is missing or malformed is a
/// fatal startup error.
pub fn load(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

/// Fully resolved startup settings. Built once before the first connection
/// attempt; never reloaded (the assignment table is immutable for the
/// process lifetime).
#[derive(Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub daemon: bool,
    pub assignments: Vec<PinAssignment>,
}

impl Settings {
    /// Merges command-line arguments over the settings file.
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self> {
        let connect = args
            .connect
            .or(file.connect)
            .unwrap_or_else(|| DEFAULT_CONNECT.to_string());
        let (host, port) = parse_connect(&connect)?;

        let mut assignments = file.assignments;
        assignments.extend(args.assign);

        Ok(Self {
            host,
            port,
            password: args.password.or(file.password),
            daemon: args.daemon || file.daemon,
            assignments,
        })
    }
}

/// Splits a `HOST:PORT` connection target.
pub fn parse_connect(target: &str) -> Result<(String, u16)> {
    let Some((host, port)) = target.rsplit_once(':') else {
        bail!("expected HOST:PORT, got {target:?}");
    };
    if host.is_empty() {
        bail!("empty host in {target:?}");
    }
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in {target:?}"))?;
    Ok((host.to_string(), port))
}
