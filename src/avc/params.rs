//! SPS/PPS selection for the rebuilt stream.
//!
//! The camera only stores its parameter sets in the avcC box, which an
//! interrupted recording usually lacks, so a snapshot taken from a good
//! Snapmaker U1 recording stands in when none can be recovered.

use crate::mp4::{find_avcc_payload, AvccConfig, MdatRegion};
use log::{info, warn};

/// SPS of a known good Snapmaker U1 timelapse
pub const SNAPMAKER_U1_SPS: &[u8] = &[
    0x67, 0x64, 0x00, 0x28, 0xac, 0xd9, 0x40, 0x78, 0x02, 0x27, 0xe5, 0xc0, 0x5a, 0x81, 0x01, 0x02,
    0xa0, 0x00, 0x00, 0x03, 0x00, 0x20, 0x00, 0x00, 0x06, 0x01, 0xe3, 0x06, 0x32, 0xc0,
];

/// PPS of a known good Snapmaker U1 timelapse
pub const SNAPMAKER_U1_PPS: &[u8] = &[0x68, 0xea, 0xe3, 0xcb, 0x22, 0xc0];

/// How parameter sets are chosen for the rebuilt stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParameterSetMode {
    /// The file's own avcC when it survived, the built-in sets otherwise
    #[default]
    Auto,
    Builtin,
    /// Write the recovered units only
    Omit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetSource {
    Container,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
    pub source: ParameterSetSource,
}

impl ParameterSets {
    pub fn builtin() -> Self {
        Self {
            sps: vec![SNAPMAKER_U1_SPS.to_vec()],
            pps: vec![SNAPMAKER_U1_PPS.to_vec()],
            source: ParameterSetSource::Builtin,
        }
    }

    /// Take the sets of an avcC record, `None` unless it has both kinds
    pub fn from_avcc(config: AvccConfig) -> Option<Self> {
        config.is_valid().then(|| Self {
            sps: config.sps,
            pps: config.pps,
            source: ParameterSetSource::Container,
        })
    }

    /// Pick the parameter sets for a file according to `mode`.
    pub fn resolve(mode: ParameterSetMode, data: &[u8], mdat: &MdatRegion) -> Option<Self> {
        match mode {
            ParameterSetMode::Omit => None,
            ParameterSetMode::Builtin => Some(Self::builtin()),
            ParameterSetMode::Auto => Some(Self::from_container(data, mdat).unwrap_or_else(|| {
                info!("Using built-in Snapmaker U1 parameter sets");
                Self::builtin()
            })),
        }
    }

    fn from_container(data: &[u8], mdat: &MdatRegion) -> Option<Self> {
        let payload = find_avcc_payload(data, mdat)?;
        let config = match AvccConfig::parse(payload) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring avcC box: {}", e);
                return None;
            }
        };
        if config.nal_length_size() != 4 {
            warn!(
                "avcC declares {}-byte NAL lengths; mdat is still read with 4-byte prefixes",
                config.nal_length_size()
            );
        }
        let sets = Self::from_avcc(config)?;
        info!(
            "Using parameter sets from avcC: {} SPS, {} PPS",
            sets.sps.len(),
            sets.pps.len()
        );
        Some(sets)
    }
}
