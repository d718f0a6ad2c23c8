use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use cadenza_models::{MediaItem, MediaKind, MediaSource};

use crate::resolver::{MediaReference, MediaResolver, ResolveError};

/// Resolves page links to direct stream URLs by shelling out to `yt-dlp`.
/// Stream quality is capped by height (the userbot lineage used 480p) via
/// the `best[height<=N]/best` format selector.
pub struct YtDlpResolver {
    binary: PathBuf,
    max_height: u32,
}

impl YtDlpResolver {
    /// Locates `yt-dlp` on PATH. Deployments without it simply run with
    /// link extraction disabled.
    pub fn discover(max_height: u32) -> Result<Self, ResolveError> {
        let binary = which::which("yt-dlp").map_err(|_| {
            ResolveError::Unsupported("yt-dlp binary not found on PATH".into())
        })?;
        debug!(binary = %binary.display(), "yt-dlp located");
        Ok(Self { binary, max_height })
    }

    pub fn with_binary(binary: impl Into<PathBuf>, max_height: u32) -> Self {
        Self {
            binary: binary.into(),
            max_height,
        }
    }

    fn format_selector(&self) -> String {
        format!("best[height<={}]/best", self.max_height)
    }

    async fn extract(&self, link: &str) -> Result<ExtractorInfo, ResolveError> {
        let output = Command::new(&self.binary)
            .arg("-J")
            .arg("--no-warnings")
            .arg("--no-check-certificates")
            .arg("--format")
            .arg(self.format_selector())
            .arg(link)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extractor(
                stderr.lines().last().unwrap_or("yt-dlp failed").to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_extractor_output(&stdout)
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(
        &self,
        reference: &MediaReference,
        audio_only: bool,
    ) -> Result<MediaItem, ResolveError> {
        let MediaReference::Link(link) = reference else {
            return Err(ResolveError::Unsupported(
                "expected a link, not an attachment".into(),
            ));
        };
        let info = self.extract(link).await?;
        info.into_item(audio_only)
    }
}

/// The slice of a yt-dlp `-J` info dict this resolver cares about.
#[derive(Debug, Deserialize)]
struct ExtractorInfo {
    url: Option<String>,
    title: Option<String>,
    vcodec: Option<String>,
    height: Option<u32>,
}

impl ExtractorInfo {
    fn into_item(self, audio_only: bool) -> Result<MediaItem, ResolveError> {
        let url = self.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            ResolveError::Extractor("no playable url in extractor output".into())
        })?;

        let has_video =
            self.vcodec.as_deref().is_some_and(|v| v != "none") || self.height.is_some();
        let kind = if audio_only || !has_video {
            MediaKind::Audio
        } else {
            MediaKind::Video
        };

        let mut item = MediaItem::new(kind, MediaSource::RemoteUrl(url));
        if let Some(title) = self.title {
            item = item.with_title(title);
        }
        Ok(item)
    }
}

fn parse_extractor_output(raw: &str) -> Result<ExtractorInfo, ResolveError> {
    serde_json::from_str(raw)
        .map_err(|e| ResolveError::Extractor(format!("unparseable yt-dlp output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_selector_caps_height() {
        let resolver = YtDlpResolver::with_binary("/usr/bin/yt-dlp", 480);
        assert_eq!(resolver.format_selector(), "best[height<=480]/best");
    }

    #[test]
    fn video_info_becomes_video_item() {
        let info = parse_extractor_output(
            r#"{"url": "https://cdn.example/stream", "title": "Some Clip",
                "vcodec": "avc1.64001F", "height": 480, "extra": "ignored"}"#,
        )
        .unwrap();
        let item = info.into_item(false).unwrap();
        assert_eq!(item.kind, MediaKind::Video);
        assert_eq!(item.display_title(), "Some Clip");
        assert_eq!(
            item.source,
            MediaSource::RemoteUrl("https://cdn.example/stream".into())
        );
    }

    #[test]
    fn audio_only_coerces_to_audio() {
        let info = parse_extractor_output(
            r#"{"url": "https://cdn.example/stream", "vcodec": "avc1", "height": 360}"#,
        )
        .unwrap();
        assert_eq!(info.into_item(true).unwrap().kind, MediaKind::Audio);
    }

    #[test]
    fn vcodec_none_means_audio() {
        let info = parse_extractor_output(
            r#"{"url": "https://cdn.example/a", "title": "Track", "vcodec": "none"}"#,
        )
        .unwrap();
        assert_eq!(info.into_item(false).unwrap().kind, MediaKind::Audio);
    }

    #[test]
    fn missing_url_is_an_extractor_error() {
        let info = parse_extractor_output(r#"{"title": "No stream here"}"#).unwrap();
        assert!(matches!(
            info.into_item(false),
            Err(ResolveError::Extractor(_))
        ));
    }

    #[test]
    fn garbage_output_is_an_extractor_error() {
        assert!(matches!(
            parse_extractor_output("WARNING: not json"),
            Err(ResolveError::Extractor(_))
        ));
    }
}
