//! The `meta.json` index of stored documents

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

/// File name of the index inside the downloads directory
pub const METADATA_FILE: &str = "meta.json";

/// A stored document, as recorded in the index
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// File name inside the downloads directory, e.g. `document3.pdf`
    pub generic_filename: String,
}

/// Index of all stored documents, keyed by their SHA-256
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Stored documents by content hash
    pub files_by_hash: BTreeMap<String, FileRecord>,
    /// Number used for the next stored document's file name
    #[serde(default = "first_id")]
    pub next_id: u64,
}

fn first_id() -> u64 {
    1
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            files_by_hash: BTreeMap::new(),
            next_id: first_id(),
        }
    }
}

impl Metadata {
    /// Path of the index inside `dir`
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE)
    }

    /// Load the index from `dir`.
    ///
    /// A missing or unreadable index starts a fresh one. Only I/O errors other
    /// than a missing file are returned.
    pub async fn load(dir: &Path) -> io::Result<Self> {
        let bytes = match tokio::fs::read(Self::path(dir)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                tracing::warn!(err = %e, "Unusable meta.json, re-initializing");
                Ok(Self::default())
            }
        }
    }

    /// Persist the index into `dir`, replacing the previous one atomically.
    pub async fn save(&self, dir: &Path) -> io::Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;

        let tmp = dir.join(format!(".{METADATA_FILE}.tmp"));
        tokio::fs::write(&tmp, &buf).await?;
        tokio::fs::rename(&tmp, Self::path(dir)).await
    }

    /// Look up a document by hash
    pub fn get(&self, hash: &str) -> Option<&FileRecord> {
        self.files_by_hash.get(hash)
    }

    /// Reserve a file name for a new document with the given extension and record it.
    pub fn insert(&mut self, hash: &str, extension: &str) -> &FileRecord {
        let generic_filename = format!("document{}{extension}", self.next_id);
        self.next_id += 1;

        self.files_by_hash
            .entry(hash.to_string())
            .or_insert(FileRecord { generic_filename })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test_log::test(tokio::test)]
    async fn test_missing_index_starts_fresh() -> TestResult {
        let dir = tempfile::tempdir()?;
        assert_eq!(Metadata::load(dir.path()).await?, Metadata::default());
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_legacy_or_corrupt_index_starts_fresh() -> TestResult {
        let dir = tempfile::tempdir()?;

        tokio::fs::write(Metadata::path(dir.path()), r#"{"files": {}}"#).await?;
        assert_eq!(Metadata::load(dir.path()).await?, Metadata::default());

        tokio::fs::write(Metadata::path(dir.path()), "{ not json").await?;
        assert_eq!(Metadata::load(dir.path()).await?, Metadata::default());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_save_and_reload() -> TestResult {
        let dir = tempfile::tempdir()?;
        let mut metadata = Metadata::default();

        assert_eq!(metadata.insert("aaa", ".pdf").generic_filename, "document1.pdf");
        assert_eq!(metadata.insert("bbb", ".txt").generic_filename, "document2.txt");
        assert_eq!(metadata.next_id, 3);

        metadata.save(dir.path()).await?;

        let raw = tokio::fs::read_to_string(Metadata::path(dir.path())).await?;
        assert!(raw.contains("\n    \"files_by_hash\""));

        assert_eq!(Metadata::load(dir.path()).await?, metadata);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_next_id_defaults() -> TestResult {
        let dir = tempfile::tempdir()?;
        tokio::fs::write(
            Metadata::path(dir.path()),
            r#"{"files_by_hash": {"abc": {"generic_filename": "document1.pdf"}}}"#,
        )
        .await?;

        let metadata = Metadata::load(dir.path()).await?;
        assert_eq!(metadata.next_id, 1);
        assert!(metadata.get("abc").is_some());

        Ok(())
    }
}
