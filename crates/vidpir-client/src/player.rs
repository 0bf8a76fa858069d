//! Hand the reconstructed media to the platform's default player

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

#[cfg(target_os = "windows")]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg("start").arg("").arg(path);
    cmd
}

#[cfg(target_os = "macos")]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn launcher(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

/// Open `path` with the default application
///
/// Playback is best effort: the caller logs a failure and carries on.
pub fn open(path: &Path) -> io::Result<()> {
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ));
    }

    let status: ExitStatus = launcher(path).status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("player exited with {}", status),
        ));
    }

    tracing::info!(path = %path.display(), "Opened media player");
    Ok(())
}
