//! Offline template script, the last resort for the script capability.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};

use crate::adapter::ProviderAdapter;
use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;
use crate::script::{template_scenes, write_script};

#[derive(Debug, Default)]
pub struct TemplateScript;

#[async_trait]
impl ProviderAdapter for TemplateScript {
    fn provider(&self) -> Provider {
        Provider::Template
    }

    fn capability(&self) -> Capability {
        Capability::Script
    }

    async fn invoke(
        &self,
        params: &GenerationParams,
        _credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure> {
        let GenerationParams::Script {
            prompt,
            scene_count,
            default_duration,
        } = params
        else {
            return Err(ProviderFailure::unsupported(params.capability()));
        };

        let scenes = template_scenes(prompt, *scene_count, *default_duration);
        write_script(output, &scenes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_requested_scene_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("script.json");
        let params = GenerationParams::Script {
            prompt: "coral reefs".to_string(),
            scene_count: 4,
            default_duration: 3.0,
        };

        TemplateScript.invoke(&params, None, &output).await.unwrap();

        let scenes = crate::script::read_script(&output).await.unwrap();
        assert_eq!(scenes.len(), 4);
        assert_eq!(scenes[0].title, "Scene 1");
    }
}
