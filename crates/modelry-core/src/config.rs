//! Engine configuration.

use crate::render::RenderCachePolicy;

/// Default number of memoised renderings.
pub const DEFAULT_RENDER_CACHE_CAPACITY: usize = 4096;

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attributes whose name ends with this suffix are never prompted for by `create`/`edit`.
    pub identity_suffix: String,
    /// Marker that turns a text criterion into a LIKE pattern.
    pub wildcard: char,
    /// Text criterion that means null.
    pub null_literal: String,
    /// Render memoisation policy.
    pub render_cache: RenderCachePolicy,
    /// Maximum number of memoised renderings.
    pub render_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identity_suffix: "id".to_string(),
            wildcard: '%',
            null_literal: "None".to_string(),
            render_cache: RenderCachePolicy::default(),
            render_cache_capacity: DEFAULT_RENDER_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity suffix.
    pub fn with_identity_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.identity_suffix = suffix.into();
        self
    }

    /// Set the wildcard marker.
    pub fn with_wildcard(mut self, wildcard: char) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// Set the null literal.
    pub fn with_null_literal(mut self, literal: impl Into<String>) -> Self {
        self.null_literal = literal.into();
        self
    }

    /// Set the render cache policy.
    pub fn with_render_cache(mut self, policy: RenderCachePolicy) -> Self {
        self.render_cache = policy;
        self
    }

    /// Set the render cache capacity.
    pub fn with_render_cache_capacity(mut self, capacity: usize) -> Self {
        self.render_cache_capacity = capacity;
        self
    }

    /// Whether the collector skips this attribute.
    pub fn is_identity_like(&self, attribute: &str) -> bool {
        attribute.ends_with(&self.identity_suffix)
    }
}
