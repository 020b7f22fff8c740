use binrw::binrw;

use crate::ResourceId;

/// Package signature.
pub const MAGIC: [u8; 4] = *b"DBPF";

/// Size of the header as written by [`PackageBuilder`](crate::PackageBuilder).
pub const HEADER_SIZE: usize = 96;

/// Bytes of the header a reader needs: everything up to and including the
/// index entry count.
pub const MIN_HEADER_SIZE: usize = 44;

/// Fixed-offset package header.
///
/// Only the fields the index reader needs are modelled. The index offset sits
/// at byte 36 and the entry count at byte 40; the bytes in between the version
/// and the index location are reserved.
#[binrw]
#[brw(little, magic = b"DBPF")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackageHeader {
    pub major_version: u32,
    pub minor_version: u32,

    #[brw(pad_before = 24)]
    pub index_offset: u32,
    pub index_count: u32,
}

/// One record of the resource index.
///
/// `position` and `size` locate the payload inside the package. The index
/// reader decodes them but conflict detection never uses them.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    pub resource: ResourceId,
    pub position: u32,
    pub size: u32,
}

impl IndexEntry {
    /// Size of a serialized entry in bytes.
    pub const fn size_of() -> usize {
        std::mem::size_of::<u32>() * 4 + std::mem::size_of::<u64>()
    }
}
