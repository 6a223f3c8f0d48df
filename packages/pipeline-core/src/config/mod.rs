//! Pipeline configuration (SPEC_FULL.md §4 Ambient Stack: Configuration).
//! Loadable from YAML with environment-variable overrides, ported from
//! `apps/server/src/config.rs`'s `ServerConfig::load`/`apply_env_overrides`
//! pattern. Defaults match the literal values used in spec.md §8's
//! end-to-end scenarios.

use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};

/// Tunables for every pipeline element that needs one (spec.md §4).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Length, in jiffies, of every ramp up/down (Seeker, Skipper, Waiter,
    /// Stopper, Ramper, Muter, Starvation monitor).
    /// Override: `PIPELINE_RAMP_DURATION_JIFFIES`
    pub ramp_duration_jiffies: u64,

    /// Decoded-jiffies fill below which the starvation monitor ramps down
    /// and starts buffering.
    /// Override: `PIPELINE_STARVATION_THRESHOLD_JIFFIES`
    pub starvation_threshold_jiffies: u64,

    /// Decoded-jiffies fill the starvation monitor must recover to before
    /// ramping back up out of buffering.
    /// Override: `PIPELINE_NORMAL_MAX_JIFFIES`
    pub normal_max_jiffies: u64,

    /// Decoded-jiffies fill the Gorger waits for before releasing its
    /// downstream Pull, for non-real-time modes.
    /// Override: `PIPELINE_GORGE_SIZE_JIFFIES`
    pub gorge_size_jiffies: u64,

    /// Maximum size, in bytes, of the encoded reservoir.
    /// Override: `PIPELINE_ENCODED_RESERVOIR_MAX_BYTES`
    pub encoded_reservoir_max_bytes: u64,

    /// Maximum size, in jiffies, of the decoded reservoir.
    /// Override: `PIPELINE_DECODED_RESERVOIR_MAX_JIFFIES`
    pub decoded_reservoir_max_jiffies: u64,

    /// Maximum size, in jiffies, of the starvation monitor's terminal
    /// buffer.
    /// Override: `PIPELINE_STARVATION_BUFFER_MAX_JIFFIES`
    pub starvation_buffer_max_jiffies: u64,

    /// Default variable-delay target, in jiffies, applied before any
    /// explicit `Delay` message arrives.
    /// Override: `PIPELINE_DEFAULT_DELAY_JIFFIES`
    pub default_delay_jiffies: u64,

    /// Capacity of the shared message pool, per `Message` variant.
    /// Override: `PIPELINE_POOL_CAPACITY`
    pub pool_capacity: usize,

    /// Default sample rate assumed before the first `DecodedStream`
    /// arrives (44.1kHz/16-bit stereo, per spec.md §8's scenarios).
    /// Override: `PIPELINE_DEFAULT_SAMPLE_RATE`
    pub default_sample_rate: u32,

    pub default_num_channels: u16,
    pub default_bit_depth: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ramp_duration_jiffies: crate::message::ms_to_jiffies(100),
            starvation_threshold_jiffies: crate::message::ms_to_jiffies(200),
            normal_max_jiffies: crate::message::ms_to_jiffies(1_000),
            gorge_size_jiffies: crate::message::ms_to_jiffies(500),
            encoded_reservoir_max_bytes: 1_024 * 1_024,
            decoded_reservoir_max_jiffies: crate::message::ms_to_jiffies(2_000),
            starvation_buffer_max_jiffies: crate::message::ms_to_jiffies(2_000),
            default_delay_jiffies: 0,
            pool_capacity: 64,
            default_sample_rate: 44_100,
            default_num_channels: 2,
            default_bit_depth: 16,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a YAML file, then applies environment
    /// overrides. `path == None` starts from [`PipelineConfig::default`].
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
                path: path.display().to_string(),
                source,
            })?;
            serde_yaml::from_str(&content).map_err(|source| PipelineError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! override_from_env {
            ($field:expr, $var:literal) => {
                if let Ok(val) = std::env::var($var) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                    }
                }
            };
        }

        override_from_env!(self.ramp_duration_jiffies, "PIPELINE_RAMP_DURATION_JIFFIES");
        override_from_env!(self.starvation_threshold_jiffies, "PIPELINE_STARVATION_THRESHOLD_JIFFIES");
        override_from_env!(self.normal_max_jiffies, "PIPELINE_NORMAL_MAX_JIFFIES");
        override_from_env!(self.gorge_size_jiffies, "PIPELINE_GORGE_SIZE_JIFFIES");
        override_from_env!(self.encoded_reservoir_max_bytes, "PIPELINE_ENCODED_RESERVOIR_MAX_BYTES");
        override_from_env!(self.decoded_reservoir_max_jiffies, "PIPELINE_DECODED_RESERVOIR_MAX_JIFFIES");
        override_from_env!(self.starvation_buffer_max_jiffies, "PIPELINE_STARVATION_BUFFER_MAX_JIFFIES");
        override_from_env!(self.default_delay_jiffies, "PIPELINE_DEFAULT_DELAY_JIFFIES");
        override_from_env!(self.pool_capacity, "PIPELINE_POOL_CAPACITY");
        override_from_env!(self.default_sample_rate, "PIPELINE_DEFAULT_SAMPLE_RATE");
    }
}
