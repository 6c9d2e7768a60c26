//! Provider descriptor.
//!
//! A descriptor is everything the engine and the CLI need to know about a
//! provider: its id, how to present it, which names select it on the command
//! line, and the ranked strategies its pipeline tries.

use std::fmt;
use std::sync::Arc;

use usagehub_core::ProviderId;
use usagehub_fetch::{FetchContext, FetchStrategy, ProviderPipeline, StrategyInfo};

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Static description of one provider.
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Provider id; keys the cache and the outcome map.
    pub id: ProviderId,
    /// Human-readable name.
    pub display_name: String,
    /// Additional CLI names that select this provider.
    pub aliases: Vec<String>,
    /// Whether the provider is refreshed when nothing is configured.
    pub default_enabled: bool,
    strategies: Vec<Arc<dyn FetchStrategy>>,
}

impl ProviderDescriptor {
    /// Starts a descriptor for `id`.
    pub fn builder(id: impl Into<ProviderId>) -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder::new(id)
    }

    /// Strategies in preference order.
    pub fn strategies(&self) -> &[Arc<dyn FetchStrategy>] {
        &self.strategies
    }

    /// Returns true if `name` is this provider's id or one of its aliases.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.id.as_str().eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Availability of each strategy in this context.
    pub fn strategy_info(&self, ctx: &FetchContext) -> Vec<StrategyInfo> {
        self.strategies
            .iter()
            .map(|s| StrategyInfo::from_strategy(s.as_ref(), ctx))
            .collect()
    }

    /// Builds the fallback pipeline for this provider.
    pub fn pipeline(&self) -> ProviderPipeline {
        ProviderPipeline::with_strategies(self.id.clone(), self.strategies.clone())
    }
}

impl From<&ProviderDescriptor> for ProviderPipeline {
    fn from(descriptor: &ProviderDescriptor) -> Self {
        descriptor.pipeline()
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("aliases", &self.aliases)
            .field("default_enabled", &self.default_enabled)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ProviderDescriptor`].
pub struct ProviderDescriptorBuilder {
    descriptor: ProviderDescriptor,
}

impl ProviderDescriptorBuilder {
    fn new(id: impl Into<ProviderId>) -> Self {
        let id = id.into();
        Self {
            descriptor: ProviderDescriptor {
                display_name: id.to_string(),
                id,
                aliases: Vec::new(),
                default_enabled: false,
                strategies: Vec::new(),
            },
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.display_name = name.into();
        self
    }

    /// Adds a CLI alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor.aliases.push(alias.into());
        self
    }

    /// Marks the provider as enabled by default.
    #[must_use]
    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.descriptor.default_enabled = enabled;
        self
    }

    /// Appends a strategy (lowest preference so far).
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn FetchStrategy>) -> Self {
        self.descriptor.strategies.push(strategy);
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> ProviderDescriptor {
        self.descriptor
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use async_trait::async_trait;
    use usagehub_fetch::{FetchError, FetchKind, FetchResult};

    struct Named(&'static str, bool);

    #[async_trait]
    impl FetchStrategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn kind(&self) -> FetchKind {
            FetchKind::ApiKey
        }

        fn is_available(&self, _ctx: &FetchContext) -> bool {
            self.1
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchResult, FetchError> {
            Ok(FetchResult::recoverable("unused"))
        }
    }

    fn sample() -> ProviderDescriptor {
        ProviderDescriptor::builder("Sample")
            .display_name("Sample AI")
            .alias("smp")
            .strategy(Arc::new(Named("first", false)))
            .strategy(Arc::new(Named("second", true)))
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let desc = ProviderDescriptor::builder("plain").build();
        assert_eq!(desc.id.as_str(), "plain");
        assert_eq!(desc.display_name, "plain");
        assert!(!desc.default_enabled);
        assert!(desc.strategies().is_empty());
    }

    #[test]
    fn test_matches_id_and_alias() {
        let desc = sample();
        assert!(desc.matches("sample"));
        assert!(desc.matches(" SMP "));
        assert!(!desc.matches("other"));
    }

    #[test]
    fn test_pipeline_keeps_order() {
        let desc = sample();
        let pipeline = ProviderPipeline::from(&desc);
        assert_eq!(pipeline.provider_id().as_str(), "sample");

        let info = pipeline.strategy_info(&test_context());
        let names: Vec<_> = info.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!info[0].available);
        assert!(info[1].available);
    }

    #[test]
    fn test_debug_lists_strategies() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("first"));
        assert!(debug.contains("Sample AI"));
    }
}
