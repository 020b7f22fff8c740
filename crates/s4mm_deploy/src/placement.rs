//! Putting mod files into the output root.
//!
//! Each file is placed with the cheapest method that works: a directory-entry
//! link to the same data, then a symbolic link, then a full copy. Links keep
//! the output root small but need the source on the same volume or the right
//! privileges; copying always works as long as there is space.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlacementMethod {
    /// A second directory entry for the source's data (a hard link). Needs no
    /// privilege, only works within one volume.
    DirectoryLink,
    Symlink,
    Copy,
}

impl PlacementMethod {
    /// Fallback order.
    pub const CHAIN: [PlacementMethod; 3] = [
        PlacementMethod::DirectoryLink,
        PlacementMethod::Symlink,
        PlacementMethod::Copy,
    ];

    /// Whether the destination shares its data with the source.
    pub fn is_link(self) -> bool {
        !matches!(self, PlacementMethod::Copy)
    }
}

impl fmt::Display for PlacementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlacementMethod::DirectoryLink => "link",
            PlacementMethod::Symlink => "symlink",
            PlacementMethod::Copy => "copy",
        })
    }
}

/// Filesystem primitives used to place a file.
///
/// Each method creates `destination`, which does not exist when called.
pub trait Linker: Send + Sync {
    fn directory_link(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()>;
    fn symlink(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()>;
    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()>;
}

/// [`Linker`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLinker;

impl Linker for FsLinker {
    fn directory_link(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        std::fs::hard_link(source, destination)
    }

    #[cfg(unix)]
    fn symlink(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        std::os::unix::fs::symlink(source, destination)
    }

    #[cfg(windows)]
    fn symlink(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        std::os::windows::fs::symlink_file(source, destination)
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _source: &Utf8Path, _destination: &Utf8Path) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
        std::fs::copy(source, destination)?;
        Ok(())
    }
}

/// Place `source` at `destination`, falling back along [`PlacementMethod::CHAIN`].
///
/// Whatever a failed attempt left at `destination` is removed before the next
/// attempt. Returns the last error if every method fails.
pub(crate) fn place_with_fallback(
    linker: &dyn Linker,
    source: &Utf8Path,
    destination: &Utf8Path,
) -> io::Result<PlacementMethod> {
    let mut last_error = None;
    for method in PlacementMethod::CHAIN {
        let attempt = match method {
            PlacementMethod::DirectoryLink => linker.directory_link(source, destination),
            PlacementMethod::Symlink => linker.symlink(source, destination),
            PlacementMethod::Copy => linker.copy(source, destination),
        };
        match attempt {
            Ok(()) => return Ok(method),
            Err(err) => {
                tracing::debug!("{} failed for {}: {}", method, destination, err);
                remove_entry(destination)?;
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| io::Error::other("no placement method available")))
}

/// Remove a file or link without following it. Missing entries are fine.
pub(crate) fn remove_entry(path: &Utf8Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
