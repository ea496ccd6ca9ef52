//! The `install` module scaffolds a project for running `hare`.
//!
//! It writes a launcher script under `bin/` and a sample connection file
//! under `config/`. Nothing here is read back by the library at runtime.

mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::utils::Result;

pub const LAUNCHER_PATH: &str = "bin/hare";
pub const SAMPLE_CONFIG_PATH: &str = "config/amqp.yml.sample";

/// Writes the launcher and the sample config below `root`.
///
/// Existing files are kept unless `force` is set. Returns the paths that
/// were actually written.
pub fn generate(root: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let launcher = root.join(LAUNCHER_PATH);
    if write_file(&launcher, templates::LAUNCHER, force)? {
        make_executable(&launcher)?;
        written.push(launcher);
    }

    let sample = root.join(SAMPLE_CONFIG_PATH);
    if write_file(&sample, templates::SAMPLE_CONFIG, force)? {
        written.push(sample);
    }

    Ok(written)
}

fn write_file(path: &Path, contents: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        info!(path = %path.display(), "exists, skipping");
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    info!(path = %path.display(), "created");
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
