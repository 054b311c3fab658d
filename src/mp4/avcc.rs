//! A module for parsing AVCConfigurationBox (avcC) data.
//! Recovers the SPS and PPS NAL units a broken file still carries in whatever
//! is left of its `moov` box.

use super::locator::MdatRegion;
use super::r#box::{find_tag, AVCC};
use crate::bits::reader::{peek_u32, read_u16};
use crate::errors::ContainerError;

/// Represents the parsed AVCDecoderConfigurationRecord (avcC) configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvccConfig {
    /// configurationVersion
    pub configuration_version: u8,
    /// AVCProfileIndication
    pub profile: u8,
    /// profileCompatibility
    pub compatibility: u8,
    /// AVCLevelIndication
    pub level: u8,
    /// lengthSizeMinusOne
    pub length_size_minus_one: u8,
    /// Sequence Parameter Sets
    pub sps: Vec<Vec<u8>>,
    /// Picture Parameter Sets
    pub pps: Vec<Vec<u8>>,
}

impl AvccConfig {
    /// Parse AVCDecoderConfigurationRecord as defined in ISO/IEC 14496-15.
    ///
    /// data: contents of the avcC box (excluding header). Trailing bytes such
    /// as high-profile extensions are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        if data.len() < 7 {
            return Err(ContainerError::malformed_avcc("avcC data too short"));
        }
        let configuration_version = data[0];
        if configuration_version != 1 {
            return Err(ContainerError::malformed_avcc(format!(
                "unsupported configurationVersion {}",
                configuration_version
            )));
        }
        let profile = data[1];
        let compatibility = data[2];
        let level = data[3];
        // 6 bits reserved + 2 bits
        let length_size_minus_one = data[4] & 0x03;
        // 3 bits reserved + 5 bits count
        let num_sps = data[5] & 0x1F;
        let mut pos = 6;

        let sps = read_parameter_sets(data, &mut pos, num_sps, "SPS")?;
        let num_pps = *data
            .get(pos)
            .ok_or_else(|| ContainerError::malformed_avcc("Unexpected EOF while reading PPS count"))?;
        pos += 1;
        let pps = read_parameter_sets(data, &mut pos, num_pps, "PPS")?;

        Ok(AvccConfig {
            configuration_version,
            profile,
            compatibility,
            level,
            length_size_minus_one,
            sps,
            pps,
        })
    }

    /// Check if configuration carries both parameter set kinds
    pub fn is_valid(&self) -> bool {
        !self.sps.is_empty() && !self.pps.is_empty()
    }

    /// Size in bytes of the NAL length prefixes in samples
    pub fn nal_length_size(&self) -> usize {
        self.length_size_minus_one as usize + 1
    }
}

fn read_parameter_sets(
    data: &[u8],
    pos: &mut usize,
    count: u8,
    kind: &str,
) -> Result<Vec<Vec<u8>>, ContainerError> {
    let mut sets = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u16(data, pos).ok_or_else(|| {
            ContainerError::malformed_avcc(format!("Unexpected EOF while reading {} length", kind))
        })? as usize;
        let set = data.get(*pos..*pos + len).ok_or_else(|| {
            ContainerError::malformed_avcc(format!("Unexpected EOF while reading {} data", kind))
        })?;
        sets.push(set.to_vec());
        *pos += len;
    }
    Ok(sets)
}

/// Find an avcC box by tag outside the mdat payload and return its contents.
///
/// The moov box of a broken file is usually partial, so the box tree is not
/// walked. The size field in front of the tag bounds the payload when it is
/// plausible; otherwise the search area's end does.
pub fn find_avcc_payload<'a>(data: &'a [u8], mdat: &MdatRegion) -> Option<&'a [u8]> {
    let before = &data[..mdat.box_offset.min(data.len())];
    let after = &data[mdat.end.min(data.len())..];
    [before, after]
        .into_iter()
        .find_map(|area| avcc_payload_in(area))
}

fn avcc_payload_in(area: &[u8]) -> Option<&[u8]> {
    let tag_pos = find_tag(area, &AVCC, 4)?;
    let box_start = tag_pos - 4;
    let start = tag_pos + 4;
    let end = match peek_u32(area, box_start) {
        Some(size) if size as usize >= 8 && box_start + size as usize <= area.len() => {
            box_start + size as usize
        }
        _ => area.len(),
    };
    Some(&area[start..end])
}
