//! The `resource.cfg` file that tells the game where to look for packages.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write as _;
use std::io;

pub const DIRECTIVE_FILE_NAME: &str = "resource.cfg";

/// The game ignores priorities below this.
pub const MIN_DIRECTIVE_PRIORITY: u32 = 1000;

/// Deepest folder level the directive asks the game to search.
pub const MAX_DISCOVERY_DEPTH: usize = 4;

/// Render the directive for `priority`, one `PackedFile` line per depth.
pub fn render_directive(priority: u32) -> String {
    let mut out = format!("Priority {priority}\n");
    for depth in 0..=MAX_DISCOVERY_DEPTH {
        let _ = writeln!(out, "PackedFile {}*.package", "*/".repeat(depth));
    }
    out
}

/// Overwrite the directive file in `root`.
pub fn write_directive(root: &Utf8Path, priority: u32) -> io::Result<Utf8PathBuf> {
    let path = root.join(DIRECTIVE_FILE_NAME);
    std::fs::write(&path, render_directive(priority))?;
    Ok(path)
}

/// Whether `content` has the lines the game needs.
pub fn is_valid_directive(content: &str) -> bool {
    let mut has_priority = false;
    let mut has_packed_file = false;
    for line in content.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix("Priority ") {
            has_priority |= value.trim().parse::<u32>().is_ok();
        } else if line.starts_with("PackedFile ") {
            has_packed_file = true;
        }
    }
    has_priority && has_packed_file
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestDir;

    #[test]
    fn render_lists_every_depth() {
        assert_eq!(
            render_directive(1000),
            "Priority 1000\n\
             PackedFile *.package\n\
             PackedFile */*.package\n\
             PackedFile */*/*.package\n\
             PackedFile */*/*/*.package\n\
             PackedFile */*/*/*/*.package\n"
        );
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = TestDir::new();
        std::fs::write(dir.path().join(DIRECTIVE_FILE_NAME), "stale content\n".repeat(50)).unwrap();

        write_directive(dir.path(), 2000).unwrap();
        write_directive(dir.path(), 1500).unwrap();

        let content = std::fs::read_to_string(dir.path().join(DIRECTIVE_FILE_NAME)).unwrap();
        assert_eq!(content, render_directive(1500));
    }

    #[test]
    fn validation() {
        assert!(is_valid_directive(&render_directive(1000)));
        assert!(!is_valid_directive("Priority 1000\n"));
        assert!(!is_valid_directive("PackedFile *.package\n"));
        assert!(!is_valid_directive("Priority high\nPackedFile *.package\n"));
    }
}
