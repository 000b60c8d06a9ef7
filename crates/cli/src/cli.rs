//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::MatchMode;
use std::path::PathBuf;

/// Dual Selector - dual-camera frame synchronization
#[derive(Parser, Debug)]
#[command(
    name = "dual-selector",
    author,
    version,
    about = "Dual-camera frame synchronization selector",
    long_about = "Pairs frames from two camera pipelines by capture timestamp and decides \n\
                  whether the master frame, the slave frame or a fused frame is output.\n\n\
                  `run` drives a selector profile with two simulated cameras."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DUAL_SELECTOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DUAL_SELECTOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate two cameras feeding a selector profile
    Run(RunArgs),

    /// Validate a selector profile file without running
    Validate(ValidateArgs),

    /// Display selector profiles
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Selector profile file (TOML or JSON); built-in profiles when omitted
    #[arg(short, long, env = "DUAL_SELECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Name of the selector profile to run
    #[arg(short, long, default_value = "preview", env = "DUAL_SELECTOR_PROFILE")]
    pub profile: String,

    /// Override the profile's matching window (ms)
    #[arg(long)]
    pub calib_time_ms: Option<u32>,

    /// Override the profile's matcher
    #[arg(long, value_enum)]
    pub match_mode: Option<MatchModeArg>,

    /// Frames produced per camera (0 = unlimited)
    #[arg(long, default_value = "300", env = "DUAL_SELECTOR_FRAMES")]
    pub frames: u32,

    /// Master camera frame rate
    #[arg(long, default_value = "30")]
    pub fps: f64,

    /// Slave camera frame rate (defaults to --fps)
    #[arg(long)]
    pub slave_fps: Option<f64>,

    /// Timestamp jitter bound for both cameras (ms)
    #[arg(long, default_value = "2")]
    pub jitter_ms: u64,

    /// Slave sensor clock offset relative to the master (ms)
    #[arg(long, default_value = "3")]
    pub slave_offset_ms: u64,

    /// How matched pairs are consumed
    #[arg(long, value_enum, default_value = "pair")]
    pub select: SelectMode,

    /// Buffers per camera pool
    #[arg(long, default_value = "16")]
    pub pool_size: usize,

    /// Playback speed multiplier (0 = as fast as possible)
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    /// Put the slave camera into standby after this many master frames
    #[arg(long)]
    pub standby_after: Option<u32>,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "DUAL_SELECTOR_TIMEOUT")]
    pub timeout: u64,

    /// Resolve the profile and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size between the cameras and the selector
    #[arg(long, default_value = "32", env = "DUAL_SELECTOR_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DUAL_SELECTOR_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the selector profile file to validate
    #[arg(short, long, default_value = "selectors.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Selector profile file; built-in profiles when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only show this profile
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Matcher override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchModeArg {
    /// Keep unmatched opposite entries
    Basic,
    /// Drop scanned-past entries, apply bypass/switch policy
    SyncAware,
}

impl From<MatchModeArg> for MatchMode {
    fn from(mode: MatchModeArg) -> Self {
        match mode {
            MatchModeArg::Basic => MatchMode::Basic,
            MatchModeArg::SyncAware => MatchMode::SyncAware,
        }
    }
}

/// How the consumer takes matched pairs out of the selector
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectMode {
    /// One output per pair (master, slave or fused)
    #[default]
    Pair,
    /// Each camera takes its own half
    Single,
}
