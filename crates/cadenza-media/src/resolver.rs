use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use cadenza_models::{MediaItem, MediaKind};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("extractor failed: {0}")]
    Extractor(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A user-supplied reference to something playable, before resolution.
#[derive(Debug, Clone)]
pub enum MediaReference {
    /// A chat attachment reachable at an HTTP URL.
    Attachment { url: String, file_name: String },
    /// A remote page link for the extractor (YouTube and friends).
    Link(String),
}

/// Shapes a reference into a playable [`MediaItem`]. May hit the network or
/// disk; the queue core never resolves media itself.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// `audio_only` coerces a video source to an audio item (the `.play`
    /// versus `.vplay` distinction).
    async fn resolve(
        &self,
        reference: &MediaReference,
        audio_only: bool,
    ) -> Result<MediaItem, ResolveError>;
}

/// Guesses the media kind from a file name. `None` for anything that is
/// neither audio nor video.
pub fn infer_kind(file_name: &str) -> Option<MediaKind> {
    let mime = mime_guess::from_path(Path::new(file_name)).first()?;
    match mime.type_().as_str() {
        "audio" => Some(MediaKind::Audio),
        "video" => Some(MediaKind::Video),
        _ => None,
    }
}
