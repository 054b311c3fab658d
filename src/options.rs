use crate::avc::ParameterSetMode;
use crate::remux::DEFAULT_FRAME_RATE;
use std::path::PathBuf;

/// Environment variable naming the ffmpeg binary
pub const FFMPEG_ENV: &str = "TIMELAPSE_RESCUE_FFMPEG";
/// Environment variable naming the directory for the transient stream
pub const TEMP_DIR_ENV: &str = "TIMELAPSE_RESCUE_TEMP_DIR";
/// Suffix of the transient elementary stream file
pub const TEMP_FILE_SUFFIX: &str = ".temp.h264";

/// Settings for one recovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOptions {
    /// Input frame rate passed to the muxer
    pub frame_rate: u32,
    /// Muxer binary; looked up on `PATH` when unset
    pub ffmpeg: Option<PathBuf>,
    /// Directory for the transient stream; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    pub parameter_sets: ParameterSetMode,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            ffmpeg: None,
            temp_dir: None,
            parameter_sets: ParameterSetMode::Auto,
        }
    }
}

impl RecoveryOptions {
    /// Defaults overridden by `TIMELAPSE_RESCUE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let non_empty = |key| lookup(key).filter(|p: &PathBuf| !p.as_os_str().is_empty());
        Self {
            ffmpeg: non_empty(FFMPEG_ENV),
            temp_dir: non_empty(TEMP_DIR_ENV),
            ..Self::default()
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(program.into());
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_parameter_sets(mut self, mode: ParameterSetMode) -> Self {
        self.parameter_sets = mode;
        self
    }
}
