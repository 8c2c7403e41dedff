//! Block format constants and child offset helpers.
//!
//! The file is a tree of size-prefixed blocks. A group block is a u64 child
//! count followed by that many u64 child offsets; a data block is a u64 byte
//! length followed by the bytes. The MSB of a child offset tells the two
//! apart.

/// Magic bytes at the start of a container file.
pub const MAGIC: &[u8; 5] = b"SMCon";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Current file format version.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag value once the whole tree and the root position are on disk.
pub const FROZEN_FLAG: u8 = 0xFF;

/// Frozen flag value while a flush is still writing.
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// Bit mask for the type flag in child offsets (set = data, clear = group).
pub const TYPE_FLAG_MASK: u64 = 1 << 63;

/// Mask to extract the actual offset from a child pointer.
pub const OFFSET_MASK: u64 = !(1 << 63);

/// Empty data offset marker - offset 0 with MSB set.
pub const EMPTY_DATA: u64 = TYPE_FLAG_MASK;

/// Node kind tag: named group.
pub const NODE_GROUP: u8 = 0;

/// Node kind tag: dataset holding opaque bytes.
pub const NODE_BYTES: u8 = 1;

/// Node kind tag: dataset holding a typed array.
pub const NODE_ARRAY: u8 = 2;

/// Check if a child offset represents a group (MSB clear).
#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

/// Check if a child offset represents data (MSB set).
#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Extract the actual position from a child offset.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

/// Create a group child offset (MSB clear).
#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

/// Create a data child offset (MSB set).
#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}
