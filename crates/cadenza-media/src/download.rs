use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use cadenza_models::{MediaItem, MediaKind, MediaSource};

use crate::resolver::{infer_kind, MediaReference, MediaResolver, ResolveError};

/// Downloads chat attachments into a local media directory and shapes them
/// into `LocalFile` items. Files are stored under a UUID name (original
/// extension kept) to prevent collisions.
pub struct AttachmentDownloader {
    http: reqwest::Client,
    media_dir: PathBuf,
    max_bytes: u64,
}

impl AttachmentDownloader {
    pub fn new(media_dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            media_dir: media_dir.into(),
            max_bytes,
        }
    }

    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf, ResolveError> {
        let response = self.http.get(url).send().await?.error_for_status()?;

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(ResolveError::TooLarge {
                    size,
                    limit: self.max_bytes,
                });
            }
        }

        fs::create_dir_all(&self.media_dir).await?;
        let path = self.media_dir.join(stored_file_name(file_name));
        let mut file = fs::File::create(&path).await?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                file.flush().await?;
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(ResolveError::TooLarge {
                    size: written,
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(url, path = %path.display(), written, "attachment downloaded");
        Ok(path)
    }
}

#[async_trait]
impl MediaResolver for AttachmentDownloader {
    async fn resolve(
        &self,
        reference: &MediaReference,
        audio_only: bool,
    ) -> Result<MediaItem, ResolveError> {
        let MediaReference::Attachment { url, file_name } = reference else {
            return Err(ResolveError::Unsupported(
                "expected an attachment, not a link".into(),
            ));
        };

        let kind = match infer_kind(file_name) {
            Some(_) if audio_only => MediaKind::Audio,
            Some(kind) => kind,
            None => {
                return Err(ResolveError::Unsupported(format!(
                    "'{file_name}' is not a recognized audio/video file"
                )))
            }
        };

        let path = self.download(url, file_name).await?;
        Ok(MediaItem::new(kind, MediaSource::LocalFile(path)).with_title(file_name.clone()))
    }
}

/// UUID-named destination file, original extension preserved.
fn stored_file_name(file_name: &str) -> String {
    let id = Uuid::new_v4();
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}
