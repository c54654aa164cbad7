//! Cover synthesis for audio-only memories.

use std::time::Instant;

use tracing::{info, warn};

use acervo_core::{ImageGenerator, MediaKind, MediaStore, Result, StructuredMemory};

use crate::prompt::PromptBuilder;

/// Audio submissions without an image get a generated cover.
pub fn needs_cover(media: Option<MediaKind>, has_image: bool) -> bool {
    media == Some(MediaKind::Audio) && !has_image
}

/// Generate and store a cover. Any failure yields `None`.
pub async fn generate_cover(
    images: &dyn ImageGenerator,
    store: &dyn MediaStore,
    prompts: &PromptBuilder,
    memory: &StructuredMemory,
    folder: &str,
) -> Option<String> {
    let start = Instant::now();
    match try_generate(images, store, prompts, memory, folder).await {
        Ok(url) => {
            info!(
                subsystem = "ingest",
                component = "cover",
                store = store.name(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Cover image generated"
            );
            Some(url)
        }
        Err(e) => {
            warn!(
                subsystem = "ingest",
                component = "cover",
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Cover generation failed, memory kept without cover"
            );
            None
        }
    }
}

async fn try_generate(
    images: &dyn ImageGenerator,
    store: &dyn MediaStore,
    prompts: &PromptBuilder,
    memory: &StructuredMemory,
    folder: &str,
) -> Result<String> {
    let image = images.generate_image(&prompts.cover_prompt(memory)).await?;
    let extension = match image.mime_type.as_str() {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    };
    store
        .store(&image.data, &image.mime_type, folder, &format!("cover.{}", extension))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalMediaStore;
    use acervo_core::OrganizationConfig;
    use acervo_inference::mock::MockImageGenerator;

    fn memory() -> StructuredMemory {
        StructuredMemory {
            title: "Cantiga de roda".into(),
            description: "Gravação de 1970".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_needs_cover_only_for_audio_without_image() {
        assert!(needs_cover(Some(MediaKind::Audio), false));
        assert!(!needs_cover(Some(MediaKind::Audio), true));
        assert!(!needs_cover(Some(MediaKind::Video), false));
        assert!(!needs_cover(None, false));
    }

    #[tokio::test]
    async fn test_cover_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://media");
        let images = MockImageGenerator::new();
        let url = generate_cover(
            &images,
            &store,
            &PromptBuilder::new(OrganizationConfig::default()),
            &memory(),
            "covers",
        )
        .await
        .unwrap();
        assert!(url.starts_with("http://media/covers/"));
        assert!(url.ends_with("cover.png"));
        assert!(images.prompts()[0].contains("Cantiga de roda"));
    }

    #[tokio::test]
    async fn test_cover_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://media");
        let url = generate_cover(
            &MockImageGenerator::failing(),
            &store,
            &PromptBuilder::new(OrganizationConfig::default()),
            &memory(),
            "covers",
        )
        .await;
        assert!(url.is_none());
    }
}
