//! Command definitions for the Pomodoro alarm CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::types::ConfigureParams;

// ============================================================================
// CLI Structure
// ============================================================================

/// Pomodoro alarm - a cycle timer whose alarms survive the daemon
#[derive(Parser, Debug)]
#[command(
    name = "pomodoro-alarm",
    version,
    about = "Pomodoro cycle timer with durable alarms",
    long_about = "A Pomodoro timer daemon and CLI.\n\
                  Each running interval schedules a durable deadline, so the alarm \
                  still rings if the daemon is stopped before the interval ends.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// State directory (socket, deadline record, settings)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the cycle, or resume a paused interval
    Start,

    /// Pause the running interval
    Pause,

    /// Reset the cycle to idle
    Reset,

    /// Show current timer status
    Status,

    /// Change interval durations and the long break cadence
    Config(ConfigArgs),

    /// Select the alarm sound (no argument restores the default)
    Sound {
        /// Path or file:// URI of an audio file
        uri: Option<String>,
    },

    /// Play the selected alarm sound once
    Preview,

    /// Stop a ringing alarm
    StopAlarm,

    /// Follow the countdown; alarms ring in the foreground while watching
    Watch,

    /// Run as daemon (background service)
    #[command(hide = true)]
    Daemon,

    /// Ring a durable deadline once it is due
    #[command(hide = true)]
    Fire {
        /// Token of the armed deadline
        #[arg(long)]
        token: Uuid,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Config Command Arguments
// ============================================================================

/// Arguments for the config command.
///
/// Values are passed through as text; the daemon reverts anything it
/// cannot use to the previous value.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Work duration in minutes
    #[arg(short, long, value_name = "MINUTES")]
    pub work: Option<String>,

    /// Short break duration in minutes
    #[arg(short, long = "break-time", value_name = "MINUTES")]
    pub break_time: Option<String>,

    /// Long break duration in minutes
    #[arg(short, long, value_name = "MINUTES")]
    pub long_break: Option<String>,

    /// Work intervals before a long break
    #[arg(short, long, value_name = "COUNT")]
    pub cycles: Option<String>,
}

impl From<ConfigArgs> for ConfigureParams {
    fn from(args: ConfigArgs) -> Self {
        Self {
            work: args.work,
            break_time: args.break_time,
            long_break: args.long_break,
            cycles: args.cycles,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
