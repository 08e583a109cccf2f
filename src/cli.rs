use clap::Parser;
use std::path::PathBuf;

// Build version with engine info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Engine: sim (built-in)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Play one content item through a session on the simulated engine
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Content locator to play
    #[arg(value_name = "MRL", default_value = "sim://demo")]
    pub mrl: String,

    /// Display title for the content
    #[arg(short = 't', long = "title", value_name = "TITLE")]
    pub title: Option<String>,

    /// Playback rate (1.0 = normal speed)
    #[arg(short = 'r', long = "rate", value_name = "RATE")]
    pub rate: Option<f32>,

    /// Seek to this time (ms) right after starting
    #[arg(short = 's', long = "seek", value_name = "MS")]
    pub seek_ms: Option<i64>,

    /// Pause once for this long (ms) after starting
    #[arg(short = 'p', long = "pause", value_name = "MS")]
    pub pause_ms: Option<u64>,

    /// Override the simulated content length (ms)
    #[arg(long = "length", value_name = "MS")]
    pub length_ms: Option<i64>,

    /// Collect events by polling the session queue instead of subscribing
    #[arg(long = "poll")]
    pub poll: bool,

    /// Give up waiting for end of stream after this many seconds
    #[arg(long = "timeout", value_name = "SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Write the effective settings back to the config file
    #[arg(long = "save-config")]
    pub save_config: bool,

    /// Enable debug logging to file (default: playa_session.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
