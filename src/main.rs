//! Pomodoro alarm CLI
//!
//! A Pomodoro cycle timer that keeps its promise to ring:
//! - 25 minutes of focused work
//! - 5 minutes of short break
//! - a long break after every 4 work intervals
//!
//! Each running interval also arms a durable deadline in a detached
//! process, so the alarm rings even if the daemon is gone by then.

use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use pomodoro_alarm::cli::{Cli, Commands, Display, IpcClient};
use pomodoro_alarm::paths::StatePaths;
use pomodoro_alarm::settings::SettingsStore;
use pomodoro_alarm::{daemon, deadline, IpcResponse};

/// Refresh period of the `watch` view
const WATCH_REFRESH: Duration = Duration::from_secs(1);

/// Settings file used when an explicit state directory is given
const STATE_DIR_SETTINGS_FILE: &str = "settings.toml";

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins over the verbose flag.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let explicit_root = cli.state_dir.is_some();
    let paths = StatePaths::resolve(cli.state_dir)?;

    match command {
        Commands::Start => {
            let response = IpcClient::new(&paths).start().await?;
            Display::show_result(&response);
        }
        Commands::Pause => {
            let response = IpcClient::new(&paths).pause().await?;
            Display::show_result(&response);
        }
        Commands::Reset => {
            let response = IpcClient::new(&paths).reset().await?;
            Display::show_result(&response);
        }
        Commands::Status => {
            let response = IpcClient::new(&paths).status().await?;
            Display::show_status(&response);
        }
        Commands::Config(args) => {
            let response = IpcClient::new(&paths).configure(args.into()).await?;
            Display::show_result(&response);
        }
        Commands::Sound { uri } => {
            let response = IpcClient::new(&paths).select_sound(uri).await?;
            Display::show_result(&response);
        }
        Commands::Preview => {
            let response = IpcClient::new(&paths).preview().await?;
            Display::show_result(&response);
        }
        Commands::StopAlarm => stop_alarm(&paths).await?,
        Commands::Watch => watch(&IpcClient::new(&paths)).await?,
        Commands::Daemon => {
            let settings = if explicit_root {
                SettingsStore::new(paths.root().join(STATE_DIR_SETTINGS_FILE))
            } else {
                SettingsStore::default_location()?
            };
            daemon::run(paths, settings).await?;
        }
        Commands::Fire { token } => deadline::fire::run(paths, token).await?,
        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

/// Stops the alarm wherever it rings: in the daemon or in a trigger process.
///
/// Fails only if neither the daemon nor the trigger process could be reached.
async fn stop_alarm(paths: &StatePaths) -> Result<()> {
    let daemon_result = IpcClient::new(paths).stop_alarm().await;

    #[cfg(unix)]
    let standalone = pomodoro_alarm::alarm::standalone::signal_stop(&paths.active_alarm());
    #[cfg(not(unix))]
    let standalone: Result<bool> = Ok(false);

    report_stop(daemon_result, standalone)
}

/// Reports the outcome of both stop paths.
fn report_stop(daemon: Result<IpcResponse>, standalone: Result<bool>) -> Result<()> {
    let signalled = match standalone {
        Ok(signalled) => signalled,
        Err(e) if daemon.is_ok() => {
            tracing::warn!("Failed to stop a fired deadline's alarm: {:#}", e);
            false
        }
        Err(e) => {
            if let Err(daemon_err) = &daemon {
                tracing::warn!("Daemon not reachable: {:#}", daemon_err);
            }
            return Err(e);
        }
    };

    match daemon {
        Ok(response) => Display::show_result(&response),
        Err(e) if signalled => tracing::info!("Daemon not reachable: {:#}", e),
        Err(e) => return Err(e),
    }
    if signalled {
        println!("Stopped the alarm of a fired deadline");
    }
    Ok(())
}

/// Follows the countdown until Ctrl+C.
///
/// While watching, the daemon plays alarms directly instead of dispatching
/// background alarm tasks. Every refresh renews the foreground lease, so a
/// killed `watch` falls back to background alarms on its own.
async fn watch(client: &IpcClient) -> Result<()> {
    let result = async {
        let mut refresh = tokio::time::interval(WATCH_REFRESH);
        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    let response = client.set_visibility(true).await?;
                    if let Some(data) = &response.data {
                        Display::show_watch_line(data);
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        println!();
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Err(e) = client.set_visibility(false).await {
        tracing::warn!("Failed to leave the foreground: {:#}", e);
    }
    result
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
