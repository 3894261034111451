//! Display utilities for the Pomodoro alarm CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Error messages
//! - Status display

use crate::types::{IpcResponse, ResponseData};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the daemon's message for a command, with the countdown if any.
    pub fn show_result(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("{}", response.message);
        }

        if let Some(data) = &response.data {
            if data.cycle_active == Some(true) {
                if let Some(remaining) = data.remaining_seconds {
                    println!("  Remaining: {}", Self::format_time(remaining));
                }
            }
        }
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("Pomodoro Alarm Status");
        println!("─────────────────────");

        match &response.data {
            Some(data) => {
                for line in Self::status_lines(data) {
                    println!("{}", line);
                }
            }
            None => println!("The daemon returned no status"),
        }
    }

    /// Redraws the one-line countdown shown by `watch`.
    pub fn show_watch_line(data: &ResponseData) {
        use std::io::Write;

        print!("\r\x1b[2K{}", Self::watch_line(data));
        let _ = std::io::stdout().flush();
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Builds the lines of the status view.
    fn status_lines(data: &ResponseData) -> Vec<String> {
        let mut lines = Vec::new();
        let phase = data.state.as_deref().unwrap_or("unknown");
        lines.push(format!("Phase: {}", Self::state_label(data)));

        if phase != "idle" {
            if let Some(remaining) = data.remaining_seconds {
                lines.push(format!("Remaining: {}", Self::format_time(remaining)));
            }
        }
        if let Some(count) = data.cycle_count {
            match data.cycles_before_long_break {
                Some(total) => lines.push(format!("Cycle: {}/{}", count, total)),
                None => lines.push(format!("Cycle: {}", count)),
            }
        }
        if let (Some(work), Some(brk), Some(long)) = (
            data.work_minutes,
            data.break_minutes,
            data.long_break_minutes,
        ) {
            lines.push(format!("Durations: {}m work, {}m break, {}m long break", work, brk, long));
        }
        if let Some(uri) = &data.alarm_uri {
            lines.push(format!("Alarm sound: {}", uri));
        }
        if data.running == Some(true) && data.durable == Some(false) {
            lines.push(
                "Warning: no durable deadline, the alarm will not ring if the daemon stops"
                    .to_string(),
            );
        }
        lines
    }

    fn watch_line(data: &ResponseData) -> String {
        let remaining = data.remaining_seconds.unwrap_or(0);
        format!(
            "{} {} (cycle {})",
            Self::state_label(data),
            Self::format_time(remaining),
            data.cycle_count.unwrap_or(0)
        )
    }

    fn state_label(data: &ResponseData) -> String {
        let label = match data.state.as_deref() {
            Some("idle") => "Idle",
            Some("work") => "Work",
            Some("break") => "Break",
            Some("long_break") => "Long break",
            Some(other) => other,
            None => "unknown",
        };
        let paused = data.cycle_active == Some(true) && data.running == Some(false);
        if paused {
            format!("{} (paused)", label)
        } else {
            label.to_string()
        }
    }

    /// Formats remaining seconds as `mm:ss`.
    fn format_time(total_seconds: u64) -> String {
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

// ============================================================================
// Tests
// ============================================================================
