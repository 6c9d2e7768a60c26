//! Provider registry.
//!
//! The registry is an ordinary value built once at startup and passed to
//! whoever needs it. There is no process-wide table.

use tracing::{debug, warn};
use usagehub_core::ProviderId;
use usagehub_fetch::ProviderPipeline;

use crate::claude::claude_descriptor;
use crate::codex::codex_descriptor;
use crate::descriptor::ProviderDescriptor;
use crate::zai::zai_descriptor;

// ============================================================================
// Provider Registry
// ============================================================================

/// Immutable set of provider descriptors in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Registry of every built-in provider.
    ///
    /// Order: primary providers first (Claude, Codex), then z.ai.
    pub fn builtin() -> Self {
        Self::builder()
            .register(claude_descriptor())
            .register(codex_descriptor())
            .register(zai_descriptor())
            .build()
    }

    /// Starts an empty registry.
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// All descriptors.
    pub fn all(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    /// Looks up a descriptor by id.
    pub fn get(&self, id: &ProviderId) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| &d.id == id)
    }

    /// Looks up a descriptor by id or CLI alias, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.matches(name))
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<ProviderId> {
        self.descriptors.iter().map(|d| d.id.clone()).collect()
    }

    /// Ids of providers enabled by default.
    pub fn default_enabled(&self) -> Vec<ProviderId> {
        self.descriptors
            .iter()
            .filter(|d| d.default_enabled)
            .map(|d| d.id.clone())
            .collect()
    }

    /// One pipeline per registered provider.
    pub fn pipelines(&self) -> Vec<ProviderPipeline> {
        self.descriptors.iter().map(ProviderDescriptor::pipeline).collect()
    }

    /// Returns the number of registered providers.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ProviderRegistry`].
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    descriptors: Vec<ProviderDescriptor>,
}

impl ProviderRegistryBuilder {
    /// Adds a provider. Registering an id twice replaces the earlier
    /// descriptor in place.
    #[must_use]
    pub fn register(mut self, descriptor: ProviderDescriptor) -> Self {
        if let Some(existing) = self.descriptors.iter_mut().find(|d| d.id == descriptor.id) {
            warn!(provider = %descriptor.id, "Provider registered twice, replacing");
            *existing = descriptor;
        } else {
            debug!(provider = %descriptor.id, "Provider registered");
            self.descriptors.push(descriptor);
        }
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            descriptors: self.descriptors,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_providers() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.ids(),
            vec![ProviderId::new("claude"), ProviderId::new("codex"), ProviderId::new("zai")]
        );
    }

    #[test]
    fn test_builtin_defaults_match_settings() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(
            registry.default_enabled(),
            vec![ProviderId::new("claude"), ProviderId::new("codex")]
        );
    }

    #[test]
    fn test_resolve_by_alias() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.resolve("anthropic").unwrap().id.as_str(), "claude");
        assert_eq!(registry.resolve("OpenAI").unwrap().id.as_str(), "codex");
        assert_eq!(registry.resolve("z.ai").unwrap().id.as_str(), "zai");
        assert!(registry.resolve("cursor").is_none());
    }

    #[test]
    fn test_every_provider_has_strategies() {
        for desc in ProviderRegistry::builtin().all() {
            assert!(!desc.strategies().is_empty(), "{} has no strategies", desc.id);
            assert!(desc.id.is_path_safe());
        }
    }

    #[test]
    fn test_register_replaces_duplicate() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::builder("a").display_name("First").build())
            .register(ProviderDescriptor::builder("b").build())
            .register(ProviderDescriptor::builder("A").display_name("Second").build())
            .build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].display_name, "Second");
        assert_eq!(registry.get(&ProviderId::new("a")).unwrap().display_name, "Second");
    }

    #[test]
    fn test_pipelines_match_descriptors() {
        let registry = ProviderRegistry::builtin();
        let pipelines = registry.pipelines();
        assert_eq!(pipelines.len(), registry.len());
        for (pipeline, desc) in pipelines.iter().zip(registry.all()) {
            assert_eq!(pipeline.provider_id(), &desc.id);
            assert_eq!(pipeline.len(), desc.strategies().len());
        }
    }
}
