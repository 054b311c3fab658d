//! Hand-off of the rebuilt elementary stream to an external muxer.

use crate::errors::RemuxError;
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Input frame rate of the printer camera
pub const DEFAULT_FRAME_RATE: u32 = 24;

/// Name looked up on `PATH` when no muxer binary is configured
pub const FFMPEG: &str = "ffmpeg";

/// Wraps an Annex B elementary stream into a playable container
#[cfg_attr(test, mockall::automock)]
pub trait Remuxer {
    fn remux(
        &self,
        elementary_stream: &Path,
        output: &Path,
        frame_rate: u32,
    ) -> Result<(), RemuxError>;
}

/// Stream-copy remux through the ffmpeg command-line tool
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    program: PathBuf,
}

impl FfmpegRemuxer {
    /// Use the given ffmpeg binary as is
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve `program`, or `ffmpeg` on `PATH`, to an executable
    pub fn locate(program: Option<&Path>) -> Result<Self, RemuxError> {
        let wanted = program.map_or_else(|| OsString::from(FFMPEG), |p| p.as_os_str().to_owned());
        let resolved = which::which(&wanted).map_err(|_| RemuxError::ToolNotFound {
            tool: wanted.to_string_lossy().into_owned(),
        })?;
        debug!("Using muxer at {}", resolved.display());
        Ok(Self::new(resolved))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for a stream copy at a forced input frame rate
    pub fn arguments(elementary_stream: &Path, output: &Path, frame_rate: u32) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-r".into(),
            frame_rate.to_string().into(),
            "-i".into(),
            elementary_stream.into(),
            "-c".into(),
            "copy".into(),
            output.into(),
        ]
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(
        &self,
        elementary_stream: &Path,
        output: &Path,
        frame_rate: u32,
    ) -> Result<(), RemuxError> {
        let tool = self.tool_name();
        info!(
            "Muxing {} -> {} at {} fps",
            elementary_stream.display(),
            output.display(),
            frame_rate
        );

        let result = Command::new(&self.program)
            .args(Self::arguments(elementary_stream, output, frame_rate))
            .output()
            .map_err(|source| RemuxError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(RemuxError::Failed {
                tool,
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
