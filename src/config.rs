use crate::runtime::interpreter::InterpreterConfig;
use crate::scope_info::ContextSlotCache;
use crate::scope_info::cache::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Settings shared by the CLI and embedders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub interpreter: InterpreterConfig,
    pub context_slot_cache: CacheConfig,
}

impl EngineConfig {
    /// The lookup cache, or `None` when disabled.
    pub fn build_context_slot_cache(&self) -> Option<ContextSlotCache> {
        let cache = &self.context_slot_cache;
        (cache.enabled && cache.capacity > 0).then(|| ContextSlotCache::with_capacity(cache.capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.interpreter.max_steps, None);
        let cache = config.build_context_slot_cache();
        assert_eq!(cache.map(|c| c.capacity()), Some(DEFAULT_CAPACITY));
    }

    #[test]
    fn test_disabled_cache() {
        let mut config = EngineConfig::default();
        config.context_slot_cache.enabled = false;
        assert!(config.build_context_slot_cache().is_none());
    }

    #[test]
    fn test_postcard_round_trip() {
        let config = EngineConfig {
            interpreter: InterpreterConfig {
                max_steps: Some(10_000),
                max_frame_registers: 64,
            },
            context_slot_cache: CacheConfig {
                enabled: false,
                capacity: 16,
            },
        };
        let bytes = postcard::to_allocvec(&config).unwrap();
        let decoded: EngineConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, config);
    }
}
