//! Configuration for a treekv store
//!
//! Centralized configuration with sensible defaults. There is no
//! process-wide mutable state: a config is built once and threaded through
//! store construction; individual value operations may still override the
//! codec per call.

use crate::codec::CodecOptions;

/// Configuration for a [`Store`](crate::Store) instance
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Default codec applied by value operations (put/get/append/open/create)
    /// when the caller does not pass explicit [`CodecOptions`].
    /// Default: gzip compression at level 1 (fast).
    pub codec: CodecOptions,
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the default codec options
    pub fn codec(mut self, codec: CodecOptions) -> Self {
        self.config.codec = codec;
        self
    }

    /// Disable compression by default
    pub fn plain(mut self) -> Self {
        self.config.codec = CodecOptions::plain();
        self
    }

    /// Enable gzip compression by default at the given level (0-9)
    pub fn gzip(mut self, level: u32) -> Self {
        self.config.codec = CodecOptions::gzip(level);
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_compresses_at_level_one() {
        let config = StoreConfig::default();
        assert!(config.codec.compress);
        assert_eq!(config.codec.level, 1);
    }

    #[test]
    fn builder_overrides_codec() {
        let config = StoreConfig::builder().plain().build();
        assert!(!config.codec.compress);

        let config = StoreConfig::builder().gzip(6).build();
        assert!(config.codec.compress);
        assert_eq!(config.codec.level, 6);
    }
}
