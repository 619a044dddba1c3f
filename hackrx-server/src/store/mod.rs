//! Content-addressed storage of downloaded documents.
//!
//! Documents are streamed into a temporary file next to the store, hashed
//! with SHA-256 on the way, and only moved into place (as `document<N><ext>`)
//! if no document with the same hash was stored before.

use http::{header, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use sha2::{Digest, Sha256};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{io::AsyncWriteExt, sync::Mutex};
use url::Url;

pub mod extension;
pub mod metadata;

use extension::{determine_extension, DEFAULT_EXTENSION};
use metadata::Metadata;

/// Errors fetching or storing a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The document URL could not be parsed
    #[error("invalid document URL: {0}")]
    Url(#[from] url::ParseError),
    /// The request for the document failed
    #[error(transparent)]
    Request(#[from] reqwest_middleware::Error),
    /// Reading the response body failed
    #[error(transparent)]
    Transfer(#[from] reqwest::Error),
    /// The document host answered with a non-success status
    #[error("document host responded with {0}")]
    Status(StatusCode),
    /// Writing to the store failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// No document with that hash is stored
    #[error("no document stored for hash {0}")]
    NotFound(String),
}

impl DocumentError {
    /// Whether this error means the document couldn't be downloaded,
    /// as opposed to something going wrong on our side.
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            Self::Url(_) | Self::Request(_) | Self::Transfer(_) | Self::Status(_)
        )
    }
}

/// A document that is in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    /// Lowercase hex SHA-256 of the content
    pub hash: String,
    /// Where the document lives on disk
    pub path: PathBuf,
    /// Whether this fetch stored the document for the first time
    pub is_new: bool,
}

/// Stores downloaded documents in a directory, deduplicated by content hash.
///
/// Cloning is cheap and clones share the same index lock.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    client: ClientWithMiddleware,
    index_lock: Mutex<()>,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("root", &self.inner.root)
            .finish()
    }
}

impl DocumentStore {
    /// Create a store in `root`, downloading with `client`.
    /// The directory is created on first use.
    pub fn new(root: impl Into<PathBuf>, client: ClientWithMiddleware) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                client,
                index_lock: Mutex::new(()),
            }),
        }
    }

    /// The directory documents are stored in
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Download the document at `url` and store it, unless it's already stored.
    pub async fn fetch(&self, url: &str) -> Result<StoredDocument, DocumentError> {
        let url = Url::parse(url)?;
        let root = self.root();
        tokio::fs::create_dir_all(root).await?;

        // Removed on drop, unless persisted below.
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(root)?;

        tracing::debug!(%url, temp = ?temp.path(), "Downloading document");

        let mut response = self.inner.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocumentError::Status(status));
        }

        let content_disposition = header_value(&response, header::CONTENT_DISPOSITION);
        let content_type = header_value(&response, header::CONTENT_TYPE);

        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        let mut hasher = Sha256::new();
        let mut size = 0;
        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            size += chunk.len();
        }
        file.flush().await?;
        drop(file);

        let hash = hex::encode(hasher.finalize());
        tracing::debug!(%hash, size, "Document downloaded");

        let _guard = self.inner.index_lock.lock().await;
        let mut metadata = Metadata::load(root).await?;

        if let Some(record) = metadata.get(&hash) {
            let path = root.join(&record.generic_filename);
            if tokio::fs::try_exists(&path).await? {
                tracing::info!(%hash, ?path, "Document already stored");
                return Ok(StoredDocument {
                    hash,
                    path,
                    is_new: false,
                });
            }

            // Indexed but gone from disk: put the content back where the index says.
            tracing::warn!(%hash, ?path, "Stored document missing, restoring it");
            temp.persist(&path).map_err(|e| e.error)?;
            return Ok(StoredDocument {
                hash,
                path,
                is_new: true,
            });
        }

        let extension = determine_extension(
            &url,
            content_disposition.as_deref(),
            content_type.as_deref(),
        )
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let record = metadata.insert(&hash, &extension);
        let path = root.join(&record.generic_filename);
        temp.persist(&path).map_err(|e| e.error)?;
        metadata.save(root).await?;

        tracing::info!(%hash, ?path, "New document saved");

        Ok(StoredDocument {
            hash,
            path,
            is_new: true,
        })
    }

    /// Find a stored document by its content hash.
    pub async fn lookup(&self, hash: &str) -> Result<StoredDocument, DocumentError> {
        let metadata = {
            let _guard = self.inner.index_lock.lock().await;
            Metadata::load(self.root()).await?
        };

        let record = metadata
            .get(hash)
            .ok_or_else(|| DocumentError::NotFound(hash.to_string()))?;

        Ok(StoredDocument {
            hash: hash.to_string(),
            path: self.root().join(&record.generic_filename),
            is_new: false,
        })
    }

    /// Whether the store directory can be created and written to.
    pub async fn is_writable(&self) -> bool {
        if tokio::fs::create_dir_all(self.root()).await.is_err() {
            return false;
        }

        let root = self.root().to_path_buf();
        tokio::task::spawn_blocking(move || tempfile::tempfile_in(root).is_ok())
            .await
            .unwrap_or(false)
    }
}

fn header_value(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
