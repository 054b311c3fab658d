pub mod annexb;
pub mod avc_type;
pub mod params;
pub mod reconstruct;

pub use annexb::{ElementaryStream, START_CODE};
pub use avc_type::{NaluCounts, NaluType};
pub use params::{ParameterSetMode, ParameterSetSource, ParameterSets};
pub use reconstruct::{
    reconstruct, reconstruct_mdat, reconstruct_with, AccessUnit, AccessUnits, PrefixVerdict,
    Reconstruction, RecoveryPolicy, StopReason, TrustLengthPrefix, UnitFraming,
};
