use std::{
    collections::BTreeSet,
    io::{Cursor, Seek, SeekFrom},
};

use binrw::BinRead;
use byteorder::{ReadBytesExt, LE};
use camino::Utf8Path;

use crate::{
    error::PackageError,
    header::{IndexEntry, PackageHeader, MAGIC, MIN_HEADER_SIZE},
    ResourceId,
};

/// Extracts resource ids from package files.
///
/// Parsing is a pure read: the whole file is loaded and only fixed-width
/// integers are decoded from the header and the index table. Resource payloads
/// are never inspected.
pub struct ResourceIndexParser;

impl ResourceIndexParser {
    /// Parse the package at `path` into its set of resource ids.
    pub fn parse(path: impl AsRef<Utf8Path>) -> Result<BTreeSet<ResourceId>, PackageError> {
        Ok(PackageIndex::from_path(path)?.resource_ids())
    }

    /// Parse an in-memory package into its set of resource ids.
    pub fn parse_bytes(bytes: &[u8]) -> Result<BTreeSet<ResourceId>, PackageError> {
        Ok(PackageIndex::from_bytes(bytes)?.resource_ids())
    }

    /// Decode only the header: version and index location.
    ///
    /// Fails like [`parse_bytes`](Self::parse_bytes) on a bad signature or a
    /// header cut short, but does not look at the index table.
    pub fn read_header(bytes: &[u8]) -> Result<PackageHeader, PackageError> {
        decode_header(bytes)
    }
}

/// The decoded header and index table of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIndex {
    pub header: PackageHeader,
    pub entries: Vec<IndexEntry>,
}

impl PackageIndex {
    pub fn from_path(path: impl AsRef<Utf8Path>) -> Result<Self, PackageError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path.as_std_path())?;
        let index = Self::from_bytes(&bytes)?;
        tracing::debug!(
            "Read package index path={} version={}.{} entries={}",
            path,
            index.header.major_version,
            index.header.minor_version,
            index.entries.len()
        );
        Ok(index)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let len = bytes.len() as u64;
        let header = decode_header(bytes)?;
        let mut reader = Cursor::new(bytes);

        let entry_size = IndexEntry::size_of() as u64;
        let index_offset = u64::from(header.index_offset);
        let fits = len.saturating_sub(index_offset) / entry_size;
        let mut entries = Vec::with_capacity(u64::from(header.index_count).min(fits) as usize);

        for i in 0..u64::from(header.index_count) {
            let offset = index_offset + i * entry_size;
            ensure_available(len, offset, entry_size)?;
            reader.seek(SeekFrom::Start(offset))?;
            entries.push(IndexEntry::read(&mut reader)?);
        }

        Ok(Self { header, entries })
    }

    /// Distinct resource ids named by the index.
    pub fn resource_ids(&self) -> BTreeSet<ResourceId> {
        self.entries.iter().map(|entry| entry.resource).collect()
    }
}

fn decode_header(bytes: &[u8]) -> Result<PackageHeader, PackageError> {
    if bytes.len() < MAGIC.len() {
        return Err(PackageError::InvalidFormat {
            found: bytes.to_vec(),
        });
    }
    let mut reader = Cursor::new(bytes);
    let magic = reader.read_u32::<LE>()?;
    if magic != u32::from_le_bytes(MAGIC) {
        return Err(PackageError::InvalidFormat {
            found: magic.to_le_bytes().to_vec(),
        });
    }

    ensure_available(
        bytes.len() as u64,
        MAGIC.len() as u64,
        (MIN_HEADER_SIZE - MAGIC.len()) as u64,
    )?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(PackageHeader::read(&mut reader)?)
}

fn ensure_available(len: u64, offset: u64, needed: u64) -> Result<(), PackageError> {
    match offset.checked_add(needed) {
        Some(end) if end <= len => Ok(()),
        _ => Err(PackageError::Truncated {
            offset,
            needed,
            len,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PackageBuilder;
    use proptest::prelude::*;

    fn header_bytes(index_offset: u32, index_count: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; MIN_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        bytes[36..40].copy_from_slice(&index_offset.to_le_bytes());
        bytes[40..44].copy_from_slice(&index_count.to_le_bytes());
        bytes
    }

    #[test]
    fn test_parse_built_package() {
        let a = ResourceId::new(0x034AEECB, 0, 0x1122334455667788);
        let b = ResourceId::new(0x0333406C, 0x80000000, 42);
        let bytes = PackageBuilder::new()
            .with_resource(a, b"cas part".to_vec())
            .with_resource(b, b"<I n=\"tuning\"/>".to_vec())
            .build()
            .unwrap();

        let ids = ResourceIndexParser::parse_bytes(&bytes).unwrap();
        assert_eq!(ids, BTreeSet::from([a, b]));
    }

    #[test]
    fn test_parse_reads_header_version() {
        let bytes = PackageBuilder::new()
            .with_version(2, 1)
            .with_resource(ResourceId::new(1, 2, 3), vec![0xAB; 4])
            .build()
            .unwrap();

        let index = PackageIndex::from_bytes(&bytes).unwrap();
        assert_eq!(index.header.major_version, 2);
        assert_eq!(index.header.minor_version, 1);
        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].size, 4);
    }

    #[test]
    fn test_duplicate_index_entries_collapse() {
        let id = ResourceId::new(7, 7, 7);
        let bytes = PackageBuilder::new()
            .with_resource(id, vec![1])
            .with_resource(id, vec![2])
            .build()
            .unwrap();

        let index = PackageIndex::from_bytes(&bytes).unwrap();
        assert_eq!(index.entries.len(), 2);
        assert_eq!(index.resource_ids().len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let bytes = PackageBuilder::new().build().unwrap();
        assert!(ResourceIndexParser::parse_bytes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_bad_magic_is_invalid_format() {
        let mut bytes = header_bytes(44, 0);
        bytes[0..4].copy_from_slice(b"PK\x03\x04");

        let err = ResourceIndexParser::parse_bytes(&bytes).unwrap_err();
        assert!(matches!(err, PackageError::InvalidFormat { ref found } if found == b"PK\x03\x04"));
    }

    #[test]
    fn test_short_file_is_invalid_format() {
        let err = ResourceIndexParser::parse_bytes(b"DB").unwrap_err();
        assert!(matches!(err, PackageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = header_bytes(44, 0)[..20].to_vec();

        let err = ResourceIndexParser::parse_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PackageError::Truncated {
                offset: 4,
                len: 20,
                ..
            }
        ));
    }

    #[test]
    fn test_index_past_end_of_file() {
        let bytes = header_bytes(1000, 1);

        let err = ResourceIndexParser::parse_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PackageError::Truncated {
                offset: 1000,
                needed: 24,
                ..
            }
        ));
    }

    #[test]
    fn test_partial_last_entry_is_truncated() {
        let mut bytes = header_bytes(44, 2);
        bytes.extend_from_slice(&[0u8; 24 + 10]);

        let err = ResourceIndexParser::parse_bytes(&bytes).unwrap_err();
        assert!(matches!(err, PackageError::Truncated { offset: 68, .. }));
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        let bytes = header_bytes(44, u32::MAX);
        assert!(matches!(
            ResourceIndexParser::parse_bytes(&bytes),
            Err(PackageError::Truncated { offset: 44, .. })
        ));
    }

    #[test]
    fn test_read_header_skips_index() {
        // the index is claimed but absent; only the header is read
        let bytes = header_bytes(1000, 3);

        let header = ResourceIndexParser::read_header(&bytes).unwrap();
        assert_eq!(header.major_version, 2);
        assert_eq!(header.index_offset, 1000);
        assert_eq!(header.index_count, 3);
    }

    #[test]
    fn test_read_header_errors() {
        assert!(matches!(
            ResourceIndexParser::read_header(b"PK\x03\x04 and more"),
            Err(PackageError::InvalidFormat { .. })
        ));
        assert!(matches!(
            ResourceIndexParser::read_header(&header_bytes(44, 0)[..40]),
            Err(PackageError::Truncated { offset: 4, len: 40, .. })
        ));
    }

    #[test]
    fn test_parse_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("a.package")).unwrap();
        let id = ResourceId::new(0xDEADBEEF, 1, 2);
        PackageBuilder::new()
            .with_resource(id, vec![0; 8])
            .write_to_path(&path)
            .unwrap();

        assert_eq!(
            ResourceIndexParser::parse(&path).unwrap(),
            BTreeSet::from([id])
        );
    }

    #[test]
    fn test_parse_missing_file_is_io_error() {
        let err = ResourceIndexParser::parse("/definitely/not/here.package").unwrap_err();
        assert!(matches!(err, PackageError::Io(_)));
    }

    proptest! {
        #[test]
        fn prop_parse_returns_encoded_ids(
            raw in prop::collection::vec((any::<u32>(), any::<u32>(), any::<u64>()), 0..48)
        ) {
            let mut builder = PackageBuilder::new();
            for (t, g, i) in &raw {
                builder = builder.with_resource(ResourceId::new(*t, *g, *i), vec![0x5A; 3]);
            }
            let bytes = builder.build().unwrap();

            let expected: BTreeSet<ResourceId> = raw
                .iter()
                .map(|(t, g, i)| ResourceId::new(*t, *g, *i))
                .collect();
            prop_assert_eq!(ResourceIndexParser::parse_bytes(&bytes).unwrap(), expected);
        }
    }
}
