use std::io;

/// Errors produced while reading or writing a package index.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// The first four bytes are not the `DBPF` marker.
    #[error("invalid package format: expected magic \"DBPF\", found {found:02X?}")]
    InvalidFormat { found: Vec<u8> },

    /// A fixed-size read would run past the end of the file.
    #[error("package truncated: reading {needed} bytes at offset {offset} exceeds file length {len}")]
    Truncated { offset: u64, needed: u64, len: u64 },

    #[error("io error")]
    Io(#[from] io::Error),

    #[error("binrw error")]
    Decode(#[from] binrw::Error),

    /// The package being written does not fit the 32-bit offsets of the format.
    #[error("package too large: {0} bytes")]
    TooLarge(u64),
}
