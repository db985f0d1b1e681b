use chrono::Utc;
use std::path::{Path, PathBuf};

use super::{opml, StoreError};

/// What [`import_file`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Number of subscriptions in the imported file.
    pub feeds: usize,
    /// Where the previous subscription file was copied, if there was one.
    pub backup: Option<PathBuf>,
}

/// Replaces the subscription file at `dest` with the OPML file at `source`.
///
/// The source must be a regular file that decodes as OPML. An existing
/// `dest` is first copied to `<name>.backup.<YYYYMMDD_HHMMSS>` beside it; the
/// import is abandoned if that backup cannot be written.
pub fn import_file(source: &Path, dest: &Path) -> Result<ImportOutcome, StoreError> {
    let canonical = source.canonicalize().map_err(|e| StoreError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| StoreError::Read {
        path: canonical.clone(),
        source: e,
    })?;
    if !metadata.is_file() {
        return Err(StoreError::NotAFile { path: canonical });
    }

    let content = std::fs::read_to_string(&canonical).map_err(|e| StoreError::Read {
        path: canonical.clone(),
        source: e,
    })?;
    let feeds = opml::parse_opml(&content)
        .map_err(|e| StoreError::Parse {
            path: canonical.clone(),
            source: e,
        })?
        .len();

    let backup = if dest.exists() {
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "feeds.opml".to_string());
        let backup_path = dest.with_file_name(format!(
            "{}.backup.{}",
            file_name,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));

        let previous = std::fs::read(dest).map_err(|e| StoreError::Read {
            path: dest.to_path_buf(),
            source: e,
        })?;
        opml::write_atomically(&backup_path, &previous).map_err(|e| StoreError::Backup {
            path: dest.to_path_buf(),
            source: e,
        })?;
        tracing::info!(backup = %backup_path.display(), "Backed up existing subscription file");
        Some(backup_path)
    } else {
        None
    };

    opml::write_atomically(dest, content.as_bytes()).map_err(|e| StoreError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    tracing::info!(
        source = %canonical.display(),
        dest = %dest.display(),
        feeds,
        "Imported subscriptions"
    );
    Ok(ImportOutcome { feeds, backup })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPML: &str = r#"<?xml version="1.0"?>
<opml version="2.0"><body>
    <outline text="A" xmlUrl="https://a.example.com/feed"/>
    <outline text="B" xmlUrl="https://b.example.com/feed" category="Tech"/>
</body></opml>"#;

    #[test]
    fn test_import_into_empty_location() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("export.opml");
        let dest = dir.path().join("feeds.opml");
        std::fs::write(&source, OPML).unwrap();

        let outcome = import_file(&source, &dest).unwrap();
        assert_eq!(outcome.feeds, 2);
        assert_eq!(outcome.backup, None);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), OPML);
    }

    #[test]
    fn test_import_backs_up_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("export.opml");
        let dest = dir.path().join("feeds.opml");
        std::fs::write(&source, OPML).unwrap();
        std::fs::write(&dest, "<opml><body/></opml>").unwrap();

        let outcome = import_file(&source, &dest).unwrap();
        let backup = outcome.backup.expect("backup should be created");
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("feeds.opml.backup."));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "<opml><body/></opml>");
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), OPML);
    }

    #[test]
    fn test_import_rejects_non_opml() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        let dest = dir.path().join("feeds.opml");
        std::fs::write(&source, "just some text").unwrap();

        assert!(matches!(
            import_file(&source, &dest),
            Err(StoreError::Parse { .. })
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_import_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("feeds.opml");

        assert!(matches!(
            import_file(dir.path(), &dest),
            Err(StoreError::NotAFile { .. })
        ));
    }
}
