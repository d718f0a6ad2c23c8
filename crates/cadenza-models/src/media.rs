use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable identifier of a chat/room/group. The unit of queue and session
/// isolation.
pub type ConversationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Where the playable bytes come from. Exactly one variant is ever present,
/// so callers never have to guess between a path and a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    /// A file already on local disk (downloaded attachment or operator file).
    LocalFile(PathBuf),
    /// A direct, already-resolved stream URL.
    RemoteUrl(String),
}

impl MediaSource {
    /// The string the call engine is handed (path or URL).
    pub fn location(&self) -> String {
        match self {
            MediaSource::LocalFile(path) => path.display().to_string(),
            MediaSource::RemoteUrl(url) => url.clone(),
        }
    }
}

/// An immutable descriptor of one playable item. Constructed once by a
/// resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub source: MediaSource,
    /// Display title. When absent a name is derived from the source.
    pub title: Option<String>,
    /// User who requested the item, for listings and audit.
    pub requested_by: Option<i64>,
}

impl MediaItem {
    pub fn new(kind: MediaKind, source: MediaSource) -> Self {
        Self {
            kind,
            source,
            title: None,
            requested_by: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_requester(mut self, user_id: i64) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    /// Title for listings: the provider title when present, else the file
    /// basename, else the URL itself.
    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        match &self.source {
            MediaSource::LocalFile(path) => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            MediaSource::RemoteUrl(url) => url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_prefers_explicit_title() {
        let item = MediaItem::new(
            MediaKind::Audio,
            MediaSource::LocalFile(PathBuf::from("/tmp/abc123.mp3")),
        )
        .with_title("Bette Davis Eyes");
        assert_eq!(item.display_title(), "Bette Davis Eyes");
    }

    #[test]
    fn display_title_falls_back_to_basename() {
        let item = MediaItem::new(
            MediaKind::Audio,
            MediaSource::LocalFile(PathBuf::from("/data/media/abc123.mp3")),
        );
        assert_eq!(item.display_title(), "abc123.mp3");
    }

    #[test]
    fn display_title_falls_back_to_url() {
        let item = MediaItem::new(
            MediaKind::Video,
            MediaSource::RemoteUrl("https://cdn.example/v/123".into()),
        );
        assert_eq!(item.display_title(), "https://cdn.example/v/123");
    }

    #[test]
    fn source_serializes_tagged() {
        let source = MediaSource::RemoteUrl("https://cdn.example/v/123".into());
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "remote_url");
        assert_eq!(json["value"], "https://cdn.example/v/123");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(MediaKind::Video).unwrap(), "video");
    }
}
