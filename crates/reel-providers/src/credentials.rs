//! Provider credentials and default provider order.

use std::collections::HashMap;

use reel_models::{Capability, Provider};
use tracing::debug;

/// Source of API keys and the per-capability provider ranking.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    /// Whether `provider` can be called.
    fn has_credential(&self, provider: Provider) -> bool;

    /// API key for `provider`, `None` for free providers or when unset.
    fn credential(&self, provider: Provider) -> Option<String>;

    /// Providers to try for `capability` when the caller names none.
    fn default_provider_order(&self, capability: Capability) -> Vec<Provider>;
}

/// In-memory credentials, usually loaded from the environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<Provider, String>,
    orders: HashMap<Capability, Vec<Provider>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read each provider's key from its environment variable.
    pub fn from_env() -> Self {
        let mut store = Self::new();
        for provider in Provider::ALL {
            let Some(var) = provider.credential_env() else {
                continue;
            };
            match std::env::var(var) {
                Ok(key) if !key.trim().is_empty() => {
                    debug!(provider = %provider, "Credential found in {}", var);
                    store.keys.insert(provider, key.trim().to_string());
                }
                _ => debug!(provider = %provider, "No credential in {}", var),
            }
        }
        store
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }

    /// Replace the ranking for one capability.
    pub fn with_order(mut self, capability: Capability, order: Vec<Provider>) -> Self {
        self.orders.insert(capability, order);
        self
    }

    /// Providers with a usable credential, free ones included.
    pub fn available(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.has_credential(*p))
            .collect()
    }
}

impl CredentialProvider for CredentialStore {
    fn has_credential(&self, provider: Provider) -> bool {
        !provider.requires_credential() || self.keys.contains_key(&provider)
    }

    fn credential(&self, provider: Provider) -> Option<String> {
        self.keys.get(&provider).cloned()
    }

    fn default_provider_order(&self, capability: Capability) -> Vec<Provider> {
        self.orders
            .get(&capability)
            .cloned()
            .unwrap_or_else(|| capability.ranking().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_providers_always_available() {
        let store = CredentialStore::new();
        assert!(store.has_credential(Provider::Pollinations));
        assert!(store.has_credential(Provider::Gtts));
        assert!(!store.has_credential(Provider::Stability));
        assert_eq!(store.credential(Provider::Pollinations), None);
    }

    #[test]
    fn test_keys_and_order_override() {
        let store = CredentialStore::new()
            .with_key(Provider::ElevenLabs, "el-key")
            .with_order(Capability::Voice, vec![Provider::Gtts]);

        assert_eq!(store.credential(Provider::ElevenLabs).as_deref(), Some("el-key"));
        assert_eq!(store.default_provider_order(Capability::Voice), vec![Provider::Gtts]);
        assert_eq!(
            store.default_provider_order(Capability::Image),
            Capability::Image.ranking().to_vec()
        );
        assert!(store.available().contains(&Provider::ElevenLabs));
    }
}
