//! Stopping an alarm that rings in a trigger process.
//!
//! A trigger process records its PID while its alarm rings and holds an
//! exclusive lock on the file for as long as it lives. `stop-alarm` only
//! signals a PID whose file is still locked: a file nobody holds was left
//! behind by a process that died, and its PID may belong to someone else by
//! now.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

/// PID file that exists exactly while a standalone alarm rings.
#[derive(Debug)]
pub struct ActiveAlarmFile {
    path: PathBuf,
    /// Locked for the lifetime of the alarm.
    file: File,
}

impl ActiveAlarmFile {
    /// Records the current process as the ringing alarm.
    ///
    /// Fails with `WouldBlock` while another trigger process holds the file.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // No truncate before the lock: the file may belong to a live alarm.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()?;

        file.set_len(0)?;
        file.rewind()?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ActiveAlarmFile {
    fn drop(&mut self) {
        // Removed while still locked, so nobody sees it as stale.
        let _ = std::fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Reads the PID stored in an alarm file.
pub fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok().and_then(|content| parse_pid(&content))
}

fn parse_pid(content: &str) -> Option<u32> {
    content.trim().parse().ok()
}

/// Sends the stop signal to the process ringing a standalone alarm.
///
/// Returns false if no standalone alarm is ringing. A PID file that no
/// process holds is stale: it is removed and nothing is signalled.
#[cfg(unix)]
pub fn signal_stop(path: &Path) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to open {:?}", path)),
    };

    if file.try_lock_exclusive().is_ok() {
        tracing::debug!("Removing stale alarm file {:?}", path);
        let _ = std::fs::remove_file(path);
        return Ok(false);
    }

    let mut content = String::new();
    file.read_to_string(&mut content)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let Some(pid) = parse_pid(&content) else {
        return Ok(false);
    };
    if pid == std::process::id() {
        return Ok(false);
    }
    // Zero and negative values address process groups.
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => {
            tracing::warn!("Ignoring alarm file with invalid PID {}", pid);
            return Ok(false);
        }
    };

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => {
            tracing::info!("Sent stop signal to alarm process {}", pid);
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            tracing::debug!("Alarm process {} already exited", pid);
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to signal alarm process {pid}")),
    }
}
