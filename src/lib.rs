pub mod bits;

pub mod mp4;
pub use mp4::{locate_mdat, scan_for_mdat, walk_boxes, AvccConfig, Discovery, MdatRegion};

pub mod avc;
pub use avc::{
    reconstruct, reconstruct_with, AccessUnit, ElementaryStream, NaluType, ParameterSetMode,
    ParameterSets, Reconstruction, RecoveryPolicy, StopReason, TrustLengthPrefix,
};

pub mod remux;
pub use remux::{FfmpegRemuxer, Remuxer, DEFAULT_FRAME_RATE};

pub mod options;
pub use options::RecoveryOptions;

pub mod recover;
pub use recover::{
    extract_elementary_stream, extract_to_file, rebuild_stream, recover_file, recover_file_with,
    RecoveryReport,
};

pub mod errors;
pub use errors::{ContainerError, RecoveryError, RecoveryResult, RemuxError};
