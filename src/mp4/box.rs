use crate::bits::reader::{read_u32, read_u64};

/// Tag of the media data box
pub const MDAT: [u8; 4] = *b"mdat";
/// Tag of the AVC decoder configuration box
pub const AVCC: [u8; 4] = *b"avcC";

/// Size field of a box header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSize {
    /// Size 0: the box runs to the end of the file
    ToEnd,
    /// Total box length including the header
    Declared(u64),
}

/// Box header information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    /// Offset of the first header byte
    pub offset: usize,
    pub size: BoxSize,
    /// 8, or 16 when a 64-bit size follows the tag
    pub header_size: usize,
}

impl BoxHeader {
    /// Printable box type, non-ASCII bytes replaced
    pub fn name(&self) -> String {
        fourcc(&self.box_type)
    }

    pub fn is(&self, tag: &[u8; 4]) -> bool {
        &self.box_type == tag
    }

    /// Offset of the first payload byte
    pub fn payload_offset(&self) -> usize {
        self.offset + self.header_size
    }
}

/// Parse a box header at `offset`.
///
/// Returns `None` when the slice ends before the header does, including the
/// 64-bit extension announced by a size of 1.
pub fn parse_box_header(data: &[u8], offset: usize) -> Option<BoxHeader> {
    let mut pos = offset;
    let size32 = read_u32(data, &mut pos)?;
    let box_type: [u8; 4] = data.get(pos..pos + 4)?.try_into().ok()?;
    pos += 4;
    let size = match size32 {
        0 => BoxSize::ToEnd,
        1 => BoxSize::Declared(read_u64(data, &mut pos)?),
        n => BoxSize::Declared(n as u64),
    };
    Some(BoxHeader {
        box_type,
        offset,
        size,
        header_size: pos - offset,
    })
}

/// Write a compact box header to a vector
pub fn write_box_header(output: &mut Vec<u8>, tag: &[u8; 4], size: u32) {
    output.extend_from_slice(&size.to_be_bytes());
    output.extend_from_slice(tag);
}

/// Find the first occurrence of `tag` at or after `from`
pub fn find_tag(data: &[u8], tag: &[u8; 4], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(4)
        .position(|w| w == tag)
        .map(|i| from + i)
}

/// Render a four-character code for logs
pub fn fourcc(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}
