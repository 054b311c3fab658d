use std::error::Error;
use std::fmt;
use std::io;
use std::process::ExitStatus;

/// Enumeration of all possible errors that can occur while rescuing a recording
#[derive(Debug)]
pub enum RecoveryError {
    Container(ContainerError),
    Remux(RemuxError),
    Other(io::Error),
}

/// Errors raised while locating and reframing the media payload
#[derive(Debug)]
pub enum ContainerError {
    /// Neither the box walk nor the fallback scan found an `mdat` tag
    MdatNotFound { scanned_from: u64, file_length: u64 },
    /// An `mdat` payload was located but yielded no access unit
    NoAccessUnits {
        payload_offset: u64,
        payload_length: u64,
    },
    /// The avcC record could not be parsed
    MalformedAvcc { message: String },
}

impl ContainerError {
    /// Create an avcC parse error with the given message.
    pub fn malformed_avcc(message: impl Into<String>) -> Self {
        ContainerError::MalformedAvcc {
            message: message.into(),
        }
    }
}

/// Errors reported by the external muxer
#[derive(Debug)]
pub enum RemuxError {
    /// The muxer binary could not be located
    ToolNotFound { tool: String },
    /// The muxer binary could not be started
    Spawn { tool: String, source: io::Error },
    /// The muxer ran but exited unsuccessfully
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryError::Container(err) => write!(f, "Container error: {}", err),
            RecoveryError::Remux(err) => write!(f, "Remux error: {}", err),
            RecoveryError::Other(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::MdatNotFound {
                scanned_from,
                file_length,
            } => write!(
                f,
                "no mdat box found (fallback scan from offset {} of {} bytes); \
                 not an MP4 or too severely corrupted",
                scanned_from, file_length
            ),
            ContainerError::NoAccessUnits {
                payload_offset,
                payload_length,
            } => write!(
                f,
                "mdat payload at offset {} ({} bytes) holds no usable access unit",
                payload_offset, payload_length
            ),
            ContainerError::MalformedAvcc { message } => {
                write!(f, "malformed avcC record: {}", message)
            }
        }
    }
}

impl fmt::Display for RemuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemuxError::ToolNotFound { tool } => write!(f, "{} not found", tool),
            RemuxError::Spawn { tool, source } => {
                write!(f, "failed to start {}: {}", tool, source)
            }
            RemuxError::Failed {
                tool,
                status,
                stderr,
            } => write!(f, "{} exited with {}: {}", tool, status, stderr.trim()),
        }
    }
}

impl Error for RecoveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RecoveryError::Container(err) => Some(err),
            RecoveryError::Remux(err) => Some(err),
            RecoveryError::Other(err) => Some(err),
        }
    }
}

impl Error for ContainerError {}

impl Error for RemuxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RemuxError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Conversion implementations
impl From<io::Error> for RecoveryError {
    fn from(err: io::Error) -> Self {
        RecoveryError::Other(err)
    }
}

impl From<ContainerError> for RecoveryError {
    fn from(err: ContainerError) -> Self {
        RecoveryError::Container(err)
    }
}

impl From<RemuxError> for RecoveryError {
    fn from(err: RemuxError) -> Self {
        RecoveryError::Remux(err)
    }
}

// Conversion to io::Error for callers working in io::Result
impl From<RecoveryError> for io::Error {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::Other(err) => err,
            err => io::Error::other(err),
        }
    }
}

// Type alias for Result with RecoveryError
pub type RecoveryResult<T> = Result<T, RecoveryError>;
