//! Locating the `mdat` payload in a possibly truncated file.
//!
//! Two independent steps: a structured walk over top-level box headers, and a
//! raw scan for the `mdat` tag that only runs once the walk has given up.

use super::r#box::{find_tag, parse_box_header, BoxHeader, BoxSize, MDAT};
use crate::bits::reader::peek_u32;
use crate::errors::ContainerError;
use log::{debug, info, warn};
use std::ops::Range;

/// How the mdat region was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    BoxWalk,
    PatternScan,
}

/// Byte range of the media payload within the input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdatRegion {
    /// Offset of the mdat size field (assumed when found by pattern scan)
    pub box_offset: usize,
    pub start: usize,
    pub end: usize,
    /// Size field as read from the header, `None` for pattern-scan hits
    pub declared_size: Option<BoxSize>,
    pub discovery: Discovery,
}

impl MdatRegion {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice the payload out of the file it was located in
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.range()]
    }
}

/// Why the structured walk stopped trusting box sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    /// Header (or its 64-bit extension) cut off by end of file
    TruncatedHeader,
    /// Size 0 on a box other than mdat
    ZeroSize,
    /// Declared size smaller than the header itself
    Undersized { size: u64 },
    /// Declared size runs past end of file
    Overrun { size: u64 },
}

/// Result of the structured walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
    Found(MdatRegion),
    /// The box starting at `at` has an unusable header
    Inconsistent { at: usize, stop: WalkStop },
    /// Every box was accounted for and none was mdat
    Exhausted,
}

/// Find the mdat payload, falling back to a tag scan when the box walk fails.
pub fn locate_mdat(data: &[u8]) -> Result<MdatRegion, ContainerError> {
    let scan_from = match walk_boxes(data) {
        WalkOutcome::Found(region) => return Ok(region),
        WalkOutcome::Inconsistent { at, stop } => {
            warn!(
                "Box structure broken at offset {} ({:?}), scanning for mdat tag",
                at, stop
            );
            at
        }
        WalkOutcome::Exhausted => {
            warn!("No mdat box in top-level structure, scanning whole file for mdat tag");
            0
        }
    };

    scan_for_mdat(data, scan_from).ok_or(ContainerError::MdatNotFound {
        scanned_from: scan_from as u64,
        file_length: data.len() as u64,
    })
}

/// Walk top-level boxes from offset 0 until mdat is reached or a size cannot be trusted.
pub fn walk_boxes(data: &[u8]) -> WalkOutcome {
    let len = data.len();
    let mut offset = 0usize;

    while offset + 8 <= len {
        let Some(header) = parse_box_header(data, offset) else {
            return WalkOutcome::Inconsistent {
                at: offset,
                stop: WalkStop::TruncatedHeader,
            };
        };
        debug!("Box '{}' at offset {} ({:?})", header.name(), offset, header.size);

        if header.is(&MDAT) {
            return WalkOutcome::Found(region_from_header(&header, len));
        }

        let size = match header.size {
            BoxSize::ToEnd => {
                return WalkOutcome::Inconsistent {
                    at: offset,
                    stop: WalkStop::ZeroSize,
                }
            }
            BoxSize::Declared(size) => size,
        };
        if size < header.header_size as u64 {
            return WalkOutcome::Inconsistent {
                at: offset,
                stop: WalkStop::Undersized { size },
            };
        }
        if size > (len - offset) as u64 {
            return WalkOutcome::Inconsistent {
                at: offset,
                stop: WalkStop::Overrun { size },
            };
        }
        offset += size as usize;
    }

    WalkOutcome::Exhausted
}

/// Raw scan for the first `mdat` tag at or after `from`.
///
/// The four bytes before the tag are assumed to be its size field. The payload
/// runs to end of file and starts right after the tag, or after the 64-bit
/// size when that field reads 1.
pub fn scan_for_mdat(data: &[u8], from: usize) -> Option<MdatRegion> {
    let tag_pos = find_tag(data, &MDAT, from)?;
    let box_offset = tag_pos.saturating_sub(4);
    let mut start = tag_pos + 4;
    if tag_pos >= 4 && peek_u32(data, box_offset) == Some(1) && start + 8 <= data.len() {
        debug!("'mdat' tag at offset {} carries a 64-bit size", tag_pos);
        start += 8;
    }
    let region = MdatRegion {
        box_offset,
        start,
        end: data.len(),
        declared_size: None,
        discovery: Discovery::PatternScan,
    };
    info!(
        "Found 'mdat' tag by scan at offset {}, payload {} bytes to end of file",
        tag_pos,
        region.len()
    );
    Some(region)
}

fn region_from_header(header: &BoxHeader, len: usize) -> MdatRegion {
    let start = header.payload_offset().min(len);
    let end = match header.size {
        BoxSize::ToEnd => len,
        BoxSize::Declared(size) if size < header.header_size as u64 => {
            warn!(
                "mdat at offset {} declares {} bytes, smaller than its header; using rest of file",
                header.offset, size
            );
            len
        }
        BoxSize::Declared(size) => {
            let declared_end = (header.offset as u64).saturating_add(size);
            if declared_end > len as u64 {
                warn!(
                    "mdat at offset {} declares {} bytes but only {} remain; clamping",
                    header.offset,
                    size,
                    len - header.offset
                );
                len
            } else {
                declared_end as usize
            }
        }
    };

    info!(
        "Found 'mdat' box of size {:?} at offset {}",
        header.size, header.offset
    );
    MdatRegion {
        box_offset: header.offset,
        start,
        end,
        declared_size: Some(header.size),
        discovery: Discovery::BoxWalk,
    }
}
