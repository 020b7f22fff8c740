//! Integrity hashing for mod files.

use std::fs::File;
use std::io::{self, Read};

use camino::Utf8Path;
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Compute the xxHash3 integrity hash of a file, streaming its content.
pub fn hash_file(path: &Utf8Path) -> io::Result<u64> {
    let mut file = File::open(path.as_std_path())?;
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.digest())
}

/// Integrity hash of an in-memory buffer. Matches [`hash_file`] for equal content.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// Render a hash the way it is shown in logs and manifests.
pub fn format_hash(hash: u64) -> String {
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("big.bin")).unwrap();
        // Larger than one read buffer so the streaming path is exercised
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(&content));
    }

    #[test]
    fn test_format_hash() {
        assert_eq!(format_hash(0xAB), "00000000000000ab");
    }
}
