//! Runtime options.
//!
//! Format constants and container thresholds are compile-time constants (see
//! [`crate::container`] and [`crate::serialization`]); the structs below cover the
//! choices a caller makes per call.

use roar_common::{Result, verify_arg};

/// Options for deserializing a bitmap.
#[derive(Debug, Clone)]
pub struct ReadConfig {
    /// Run [`validate`](crate::BitmapBase::validate) on the decoded bitmap before
    /// returning it. Off by default: untrusted input must be validated explicitly
    /// by the caller, or by turning this on.
    pub validate: bool,
    /// Upper bound on the number of containers accepted from the input.
    /// Must be within `1..=65536`.
    pub max_containers: usize,
}

impl ReadConfig {
    pub const MAX_CONTAINERS: usize = 1 << 16;

    /// Configuration that validates every decoded bitmap.
    pub fn validating() -> ReadConfig {
        ReadConfig {
            validate: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(
            max_containers,
            self.max_containers > 0 && self.max_containers <= Self::MAX_CONTAINERS
        );
        Ok(())
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        ReadConfig {
            validate: false,
            max_containers: Self::MAX_CONTAINERS,
        }
    }
}

/// Reduction strategy used by [`aggregate`](crate::aggregation::aggregate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationStrategy {
    /// Left fold of pairwise operations.
    Naive,
    /// Repeatedly combines the two smallest partial results.
    PriorityQueue,
    /// Groups containers by key and reduces each group once.
    #[default]
    Horizontal,
    /// Like `Horizontal`, with key groups reduced on the rayon thread pool.
    Parallel,
}

/// Options for k-way aggregation.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub strategy: AggregationStrategy,
    /// With [`AggregationStrategy::Parallel`], inputs shorter than this fall back
    /// to the sequential horizontal reduction.
    pub parallel_min_inputs: usize,
}

impl AggregationConfig {
    pub fn with_strategy(strategy: AggregationStrategy) -> AggregationConfig {
        AggregationConfig {
            strategy,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(parallel_min_inputs, self.parallel_min_inputs > 0);
        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            strategy: AggregationStrategy::default(),
            parallel_min_inputs: 4,
        }
    }
}
