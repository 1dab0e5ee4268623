//! Artifact validation.
//!
//! An adapter returning `Ok` only means the provider answered. The validator
//! decides whether the file is usable: images must be real image data of a
//! plausible size, audio must have a measurable positive duration, and
//! scripts must parse into at least one scene. A rejected artifact counts as
//! a transient failure for the attempt that produced it.

use async_trait::async_trait;
use reel_models::Capability;
use tokio::io::AsyncReadExt;

use crate::adapters::http::io_failure;
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::policy::ValidationPolicy;
use crate::script::read_script;

/// Decides whether a generated artifact is accepted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactValidator: Send + Sync {
    /// Return the accepted artifact, possibly enriched (e.g. with a measured duration).
    async fn validate(&self, capability: Capability, artifact: Artifact) -> Result<Artifact, ProviderFailure>;
}

/// Image type from leading magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Validator backed by the filesystem and ffprobe.
#[derive(Debug, Clone, Default)]
pub struct MediaValidator {
    policy: ValidationPolicy,
}

impl MediaValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    async fn validate_image(&self, artifact: Artifact) -> Result<Artifact, ProviderFailure> {
        let size = on_disk_size(&artifact).await?;
        if size < self.policy.min_image_bytes {
            return Err(ProviderFailure::transient(format!(
                "image is {} bytes, below the {} byte minimum",
                size, self.policy.min_image_bytes
            )));
        }

        if let Some(ct) = artifact.content_type.as_deref() {
            if !ct.starts_with("image/") {
                return Err(ProviderFailure::transient(format!("content type {} is not an image", ct)));
            }
        }

        let mut header = [0u8; 12];
        let mut file = tokio::fs::File::open(&artifact.path).await.map_err(io_failure)?;
        let read = file.read(&mut header).await.map_err(io_failure)?;
        let sniffed = sniff_image_type(&header[..read])
            .ok_or_else(|| ProviderFailure::transient("artifact is not a recognised image format"))?;

        let mut artifact = artifact;
        artifact.size_bytes = size;
        if artifact.content_type.is_none() {
            artifact.content_type = Some(sniffed.to_string());
        }
        Ok(artifact)
    }

    async fn validate_audio(&self, mut artifact: Artifact) -> Result<Artifact, ProviderFailure> {
        artifact.size_bytes = on_disk_size(&artifact).await?;
        if !self.policy.measure_audio {
            return Ok(artifact);
        }

        let duration = reel_media::audio_duration(&artifact.path)
            .await
            .map_err(|e| ProviderFailure::transient(format!("unusable audio: {}", e)))?;
        Ok(artifact.with_duration(duration))
    }

    async fn validate_script(&self, artifact: Artifact) -> Result<Artifact, ProviderFailure> {
        let scenes = read_script(&artifact.path).await?;
        if scenes.is_empty() {
            return Err(ProviderFailure::transient("script has no scenes"));
        }
        Ok(artifact)
    }
}

async fn on_disk_size(artifact: &Artifact) -> Result<u64, ProviderFailure> {
    match reel_media::file_size(&artifact.path).await {
        Some(0) => Err(ProviderFailure::transient("artifact is empty")),
        Some(size) => Ok(size),
        None => Err(ProviderFailure::transient(format!(
            "artifact missing at {}",
            artifact.path.display()
        ))),
    }
}

#[async_trait]
impl ArtifactValidator for MediaValidator {
    async fn validate(&self, capability: Capability, artifact: Artifact) -> Result<Artifact, ProviderFailure> {
        match capability {
            Capability::Image => self.validate_image(artifact).await,
            Capability::Voice => self.validate_audio(artifact).await,
            Capability::Motion => {
                let size = on_disk_size(&artifact).await?;
                Ok(Artifact {
                    size_bytes: size,
                    ..artifact
                })
            }
            Capability::Script => self.validate_script(artifact).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn png_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(len, 0);
        bytes
    }

    async fn artifact_with(dir: &Path, name: &str, bytes: &[u8]) -> Artifact {
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        Artifact::new(path, bytes.len() as u64)
    }

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(&png_bytes(16)), Some("image/png"));
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_type(b"<html>"), None);
    }

    #[tokio::test]
    async fn test_accepts_real_image() {
        let dir = TempDir::new().unwrap();
        let artifact = artifact_with(dir.path(), "image.png", &png_bytes(4096)).await;

        let accepted = MediaValidator::default()
            .validate(Capability::Image, artifact)
            .await
            .unwrap();
        assert_eq!(accepted.content_type.as_deref(), Some("image/png"));
        assert_eq!(accepted.size_bytes, 4096);
    }

    #[tokio::test]
    async fn test_rejects_tiny_image() {
        let dir = TempDir::new().unwrap();
        let artifact = artifact_with(dir.path(), "image.png", &png_bytes(200)).await;

        let failure = MediaValidator::default()
            .validate(Capability::Image, artifact)
            .await
            .unwrap_err();
        assert!(failure.is_transient());
        assert!(failure.reason.contains("below"));
    }

    #[tokio::test]
    async fn test_rejects_error_page_saved_as_image() {
        let dir = TempDir::new().unwrap();
        let page = format!("<html>{}</html>", "x".repeat(2000));
        let artifact = artifact_with(dir.path(), "image.png", page.as_bytes()).await;

        let failure = MediaValidator::default()
            .validate(Capability::Image, artifact)
            .await
            .unwrap_err();
        assert!(failure.reason.contains("not a recognised image"));
    }

    #[tokio::test]
    async fn test_unmeasured_audio_checks_size() {
        let dir = TempDir::new().unwrap();
        let validator = MediaValidator::new(ValidationPolicy {
            measure_audio: false,
            ..Default::default()
        });

        let empty = artifact_with(dir.path(), "voice.mp3", &[]).await;
        assert!(validator.validate(Capability::Voice, empty).await.is_err());

        let audio = artifact_with(dir.path(), "voice2.mp3", &[0xFF, 0xFB, 0x90]).await;
        assert!(validator.validate(Capability::Voice, audio).await.is_ok());
    }

    #[tokio::test]
    async fn test_script_needs_scenes() {
        let dir = TempDir::new().unwrap();
        let artifact = artifact_with(dir.path(), "script.json", br#"{"scenes": []}"#).await;

        let failure = MediaValidator::default()
            .validate(Capability::Script, artifact)
            .await
            .unwrap_err();
        assert!(failure.reason.contains("no scenes"));
    }
}
