//! Mod discovery for the command line.

use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use s4mm_core::ModFile;
use s4mm_deploy::slot::DEFAULT_CATEGORY;
use walkdir::WalkDir;

/// Walk `dir` for mod files.
///
/// The category is the name of the folder a file sits in; files directly in
/// `dir` get [`DEFAULT_CATEGORY`]. Results are sorted by path.
pub fn discover_mods(dir: &Utf8Path) -> Result<Vec<ModFile>, CliError> {
    if !dir.is_dir() {
        return Err(CliError::ModsDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut mods = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .and_then(Utf8Path::from_path)
                .map(Utf8Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf());
            CliError::scan(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
            tracing::warn!("Skipping non UTF-8 path under {}", dir);
            continue;
        };

        let category = category_for(dir, &path);
        match ModFile::from_path(&path, category) {
            Ok(Some(mod_file)) => mods.push(mod_file),
            Ok(None) => tracing::debug!("Ignoring {}", path),
            Err(e) => return Err(CliError::scan(path, e)),
        }
    }

    tracing::info!("Found {} mods in {}", mods.len(), dir);
    Ok(mods)
}

fn category_for(dir: &Utf8Path, path: &Utf8Path) -> String {
    path.parent()
        .filter(|parent| *parent != dir)
        .and_then(Utf8Path::file_name)
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use s4mm_core::ContentType;

    #[test]
    fn categories_come_from_parent_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        std::fs::create_dir_all(dir.join("CAS/Hair")).unwrap();
        std::fs::write(dir.join("CAS/Hair/bob.package"), b"DBPF").unwrap();
        std::fs::write(dir.join("loose.package"), b"DBPF").unwrap();
        std::fs::write(dir.join("mccc.ts4script"), b"PK").unwrap();
        std::fs::write(dir.join("readme.txt"), b"hi").unwrap();

        let mods = discover_mods(dir).unwrap();
        let found: Vec<(&str, &str, ContentType)> = mods
            .iter()
            .map(|m| (m.name.as_str(), m.category.as_str(), m.content_type))
            .collect();

        assert_eq!(
            found,
            vec![
                ("bob.package", "Hair", ContentType::Package),
                ("loose.package", "MainMods", ContentType::Package),
                ("mccc.ts4script", "MainMods", ContentType::Script),
            ]
        );
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = discover_mods(Utf8Path::new("/no/such/library")).unwrap_err();
        assert!(matches!(err, CliError::ModsDirNotFound { .. }));
    }
}
