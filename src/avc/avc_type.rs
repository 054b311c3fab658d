#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    NonIDR,
    IDR,
    SEI,
    SPS,
    PPS,
    AUD,
    EOSeq,
    EOStream,
    Fill,
    Other(u8),
}

impl std::fmt::Display for NaluType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NaluType::NonIDR => "NonIDR_1",
            NaluType::IDR => "IDR_5",
            NaluType::SEI => "SEI_6",
            NaluType::SPS => "SPS_7",
            NaluType::PPS => "PPS_8",
            NaluType::AUD => "AUD_9",
            NaluType::EOSeq => "EndOfSequence_10",
            NaluType::EOStream => "EndOfStream_11",
            NaluType::Fill => "FILL_12",
            NaluType::Other(v) => return write!(f, "Other_{v}"),
        };
        f.write_str(s)
    }
}

impl NaluType {
    pub fn from_header_byte(b: u8) -> Self {
        match b & 0x1f {
            1 => NaluType::NonIDR,
            5 => NaluType::IDR,
            6 => NaluType::SEI,
            7 => NaluType::SPS,
            8 => NaluType::PPS,
            9 => NaluType::AUD,
            10 => NaluType::EOSeq,
            11 => NaluType::EOStream,
            12 => NaluType::Fill,
            v => NaluType::Other(v),
        }
    }

    /// Type of a NAL unit given its payload, `None` when empty
    pub fn of(nalu: &[u8]) -> Option<Self> {
        nalu.first().map(|&b| Self::from_header_byte(b))
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NaluType::SPS | NaluType::PPS)
    }
}

/// Tally of slice NAL units seen in a recovered stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaluCounts {
    pub idr: usize,
    pub non_idr: usize,
    pub parameter_sets: usize,
    pub other: usize,
}

impl NaluCounts {
    pub fn record(&mut self, nalu: &[u8]) {
        match NaluType::of(nalu) {
            Some(NaluType::IDR) => self.idr += 1,
            Some(NaluType::NonIDR) => self.non_idr += 1,
            Some(t) if t.is_parameter_set() => self.parameter_sets += 1,
            _ => self.other += 1,
        }
    }

    pub fn video_frames(&self) -> usize {
        self.idr + self.non_idr
    }
}
