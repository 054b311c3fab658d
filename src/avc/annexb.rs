use super::avc_type::{NaluCounts, NaluType};
use super::params::ParameterSets;
use super::reconstruct::Reconstruction;
use std::io::{self, Write};

/// Annex B start code written before every NAL unit
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Start-code delimited H.264 stream built unit by unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementaryStream {
    bytes: Vec<u8>,
    units: usize,
    counts: NaluCounts,
}

impl ElementaryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Assemble the stream for a reconstruction, led by `parameter_sets`.
    ///
    /// The parameter sets are left out when the recording already opens with
    /// an SPS of its own.
    pub fn assemble(rec: &Reconstruction<'_>, parameter_sets: Option<&ParameterSets>) -> Self {
        let opens_with_sps = rec
            .units
            .first()
            .and_then(|u| NaluType::of(u.data))
            .is_some_and(|t| t == NaluType::SPS);

        let mut stream = Self::new();
        if let Some(sets) = parameter_sets.filter(|_| !opens_with_sps) {
            for nalu in sets.sps.iter().chain(&sets.pps) {
                stream.push_unit(nalu);
            }
        }
        for unit in &rec.units {
            stream.push_unit(unit.data);
        }
        stream
    }

    /// Append one NAL unit behind a start code
    pub fn push_unit(&mut self, nalu: &[u8]) {
        self.bytes.extend_from_slice(&START_CODE);
        self.bytes.extend_from_slice(nalu);
        self.units += 1;
        self.counts.record(nalu);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.units
    }

    pub fn counts(&self) -> NaluCounts {
        self.counts
    }

    /// Write the whole stream and flush the writer
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(&self.bytes)?;
        w.flush()
    }
}
