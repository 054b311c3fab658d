/*
# Bits Reader Module

 Big-endian integer readers over byte slices. Every reader is bounds-checked and
 returns `None` instead of panicking when the slice is too short, since the data
 being read comes from files that were cut off mid-write.

 Key components:
 - Cursor readers: `read_u32()`, `read_u64()` advancing a position
 - Peek readers: `peek_u32()` reading at an offset without a cursor
*/

/// Read a 32-bit big endian value from a byte slice advancing the position.
pub fn read_u32(data: &[u8], pos: &mut usize) -> Option<u32> {
    let v = peek_u32(data, *pos)?;
    *pos += 4;
    Some(v)
}

/// Read a 64-bit big endian value from a byte slice advancing the position.
pub fn read_u64(data: &[u8], pos: &mut usize) -> Option<u64> {
    let bytes: [u8; 8] = data.get(*pos..pos.checked_add(8)?)?.try_into().ok()?;
    *pos += 8;
    Some(u64::from_be_bytes(bytes))
}

/// Read a 32-bit big endian value at `offset` without moving anything.
pub fn peek_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Read a 16-bit big endian value from a byte slice advancing the position.
pub fn read_u16(data: &[u8], pos: &mut usize) -> Option<u16> {
    let bytes: [u8; 2] = data.get(*pos..pos.checked_add(2)?)?.try_into().ok()?;
    *pos += 2;
    Some(u16::from_be_bytes(bytes))
}
