use crate::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Access to files on an attached phone.
pub trait DeviceBridge {
    /// Copy the contents of the device folder `remote` into `local`,
    /// creating `local` if needed.
    fn pull(&self, remote: &str, local: &Path) -> Result<(), Error>;

    /// Run a shell command on the device and return its stdout.
    fn shell(&self, args: &[&str]) -> Result<String, Error>;
}

/// Bridge over the `adb` executable.
pub struct AdbBridge {
    adb_path: PathBuf,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    fn run(&self, args: &[&OsStr]) -> Result<String, Error> {
        trace!("{} {:?}", self.adb_path.display(), args);
        let output = Command::new(&self.adb_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::DeviceBridge(format!("failed to start {}: {}", self.adb_path.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::DeviceBridge(format!(
                "{} exited with {}: {}",
                self.adb_path.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DeviceBridge for AdbBridge {
    /// `pull -a` keeps modification times, which database pruning relies
    /// on. Pulling `<remote>/.` into an existing folder merges instead of
    /// nesting a second level.
    fn pull(&self, remote: &str, local: &Path) -> Result<(), Error> {
        debug!("Pulling {} into {}", remote, local.display());
        fs::create_dir_all(local)?;
        let source = format!("{}/.", remote.trim_end_matches('/'));
        self.run(&[
            OsStr::new("pull"),
            OsStr::new("-a"),
            OsStr::new(&source),
            local.as_os_str(),
        ])?;
        Ok(())
    }

    fn shell(&self, args: &[&str]) -> Result<String, Error> {
        let mut full = vec![OsStr::new("shell")];
        full.extend(args.iter().map(OsStr::new));
        self.run(&full)
    }
}
