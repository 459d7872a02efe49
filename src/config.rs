//! Ingestion configuration

use crate::error::ConfigError;
use crate::schema::{InferOptions, DEFAULT_MAX_DEPTH};

pub const DEFAULT_FAN_OUT: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Configuration for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Workers started per input source
    pub fan_out_per_source: usize,

    /// Bound of the line queue between producers and workers
    pub queue_capacity: usize,

    /// Share of lines fully processed, 0..=100. Every line is counted.
    pub sampling_percentage: u8,

    /// Flat worker count, overrides `fan_out_per_source`
    pub workers: Option<usize>,

    /// Deepest record nesting accepted before a field is rejected
    pub max_depth: usize,

    pub infer: InferOptions,

    /// Seed for the sampling gate; random when unset
    pub sampling_seed: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            fan_out_per_source: DEFAULT_FAN_OUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sampling_percentage: 100,
            workers: None,
            max_depth: DEFAULT_MAX_DEPTH,
            infer: InferOptions::default(),
            sampling_seed: None,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fan_out_per_source == 0 {
            return Err(ConfigError::Zero { name: "fan-out" });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero { name: "queue capacity" });
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Zero { name: "workers" });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Zero { name: "max depth" });
        }
        if self.sampling_percentage > 100 {
            return Err(ConfigError::SamplingPercentage(self.sampling_percentage));
        }
        Ok(())
    }

    /// Number of workers for `sources` input sources
    pub fn worker_count(&self, sources: usize) -> usize {
        self.workers
            .unwrap_or_else(|| self.fan_out_per_source.saturating_mul(sources))
            .max(1)
    }
}
