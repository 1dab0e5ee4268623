//! The provider adapter seam.

use std::path::Path;

use async_trait::async_trait;
use reel_models::{Capability, Provider};

use crate::error::ProviderFailure;
use crate::outcome::Artifact;
use crate::request::GenerationParams;

/// One provider's implementation of one capability.
///
/// Adapters write the artifact to `output` and classify every failure as
/// transient or permanent. They do not retry; the chain does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn capability(&self) -> Capability;

    async fn invoke(
        &self,
        params: &GenerationParams,
        credential: Option<String>,
        output: &Path,
    ) -> Result<Artifact, ProviderFailure>;
}

/// Resolve the credential a keyed provider needs.
pub(crate) fn require_credential(credential: Option<String>) -> Result<String, ProviderFailure> {
    credential
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(ProviderFailure::missing_credential)
}
