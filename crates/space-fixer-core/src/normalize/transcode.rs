use crate::error::Error;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// External codec collaborator. Failures are plain errors; there is no
/// partial-progress reporting.
pub trait Transcoder {
    /// Rescale a video to `width`, height derived and kept even.
    fn rescale_video(&self, input: &Path, output: &Path, width: u32) -> Result<(), Error>;

    /// Convert a still image container (e.g. HEIC) to the format implied by
    /// the output extension.
    fn convert_still(&self, input: &Path, output: &Path) -> Result<(), Error>;
}

pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<(), Error> {
        trace!("{} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                Error::Transcode(format!("failed to start {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(Error::Transcode(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                last_line
            )));
        }
        Ok(())
    }
}

impl Transcoder for FfmpegTranscoder {
    fn rescale_video(&self, input: &Path, output: &Path, width: u32) -> Result<(), Error> {
        debug!("Rescaling {} to width {}", input.display(), width);
        self.run(vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.into(),
            "-vf".into(),
            format!("scale={}:-2", width).into(),
            "-c:v".into(),
            "libx264".into(),
            "-c:a".into(),
            "aac".into(),
            "-strict".into(),
            "experimental".into(),
            output.into(),
        ])
    }

    fn convert_still(&self, input: &Path, output: &Path) -> Result<(), Error> {
        debug!("Converting {} to {}", input.display(), output.display());
        self.run(vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.into(),
            "-frames:v".into(),
            "1".into(),
            "-q:v".into(),
            "2".into(),
            output.into(),
        ])
    }
}
