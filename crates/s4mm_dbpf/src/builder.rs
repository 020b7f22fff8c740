//! Writer for minimal, valid packages.
//!
//! The layout is header, then resource payloads back to back, then the index
//! table. Tooling and tests use it to produce packages with a known index.

use std::io::{self, Cursor, Seek, SeekFrom, Write};

use binrw::BinWrite;
use byteorder::{WriteBytesExt, LE};
use camino::Utf8Path;

use crate::{
    error::PackageError,
    header::{IndexEntry, PackageHeader, HEADER_SIZE},
    ResourceId,
};

#[derive(Debug, Clone)]
pub struct PackageBuilder {
    major_version: u32,
    minor_version: u32,
    resources: Vec<(ResourceId, Vec<u8>)>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self {
            major_version: 2,
            minor_version: 1,
            resources: Vec::new(),
        }
    }
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    /// Add a resource. Resources keep insertion order in the index; the same
    /// id may be added more than once.
    pub fn with_resource(mut self, id: ResourceId, data: impl Into<Vec<u8>>) -> Self {
        self.resources.push((id, data.into()));
        self
    }

    /// Write the package to `writer`.
    pub fn build_to_writer<W: Write + Seek>(&self, writer: &mut W) -> Result<(), PackageError> {
        let start = writer.stream_position()?;

        // Reserve the header, it is written once the index location is known
        writer.write_all(&[0u8; HEADER_SIZE])?;

        let mut entries = Vec::with_capacity(self.resources.len());
        for (resource, data) in &self.resources {
            let position = writer.stream_position()? - start;
            writer.write_all(data)?;
            entries.push(IndexEntry {
                resource: *resource,
                position: to_u32(position)?,
                size: to_u32(data.len() as u64)?,
            });
        }

        let index_offset = to_u32(writer.stream_position()? - start)?;
        for entry in &entries {
            entry.write(writer)?;
        }
        let end = writer.stream_position()?;

        writer.seek(SeekFrom::Start(start))?;
        PackageHeader {
            major_version: self.major_version,
            minor_version: self.minor_version,
            index_offset,
            index_count: to_u32(entries.len() as u64)?,
        }
        .write(writer)?;
        // Index flags, unused by readers
        writer.write_u32::<LE>(0)?;
        writer.seek(SeekFrom::Start(end))?;

        Ok(())
    }

    /// Build the package in memory.
    pub fn build(&self) -> Result<Vec<u8>, PackageError> {
        let mut cursor = Cursor::new(Vec::new());
        self.build_to_writer(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Build the package and write it to `path`, creating parent directories.
    pub fn write_to_path(&self, path: impl AsRef<Utf8Path>) -> Result<(), PackageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        let mut file = io::BufWriter::new(std::fs::File::create(path.as_std_path())?);
        self.build_to_writer(&mut file)?;
        file.flush()?;
        Ok(())
    }
}

fn to_u32(value: u64) -> Result<u32, PackageError> {
    u32::try_from(value).map_err(|_| PackageError::TooLarge(value))
}
