use looper_arena::ArenaConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be greater than 0")]
    ZeroSampleRate,

    #[error("channel count must be greater than 0")]
    ZeroChannels,

    #[error("tempo must be greater than 0")]
    InvalidTempo,

    #[error("beats per measure must be greater than 0")]
    ZeroBeatsPerMeasure,

    #[error("pre-roll of {preroll} elements does not fit in a {chunk_capacity}-element chunk")]
    PrerollTooLong {
        preroll: usize,
        chunk_capacity: usize,
    },
}

/// Session constants, fixed at start, not hot-reloadable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sample_rate: u32,
    /// Independent input channels, each with its own recorder.
    pub channels: u32,
    pub tempo: f64,
    pub beats_per_measure: u32,
    /// Audio retained before a recording officially starts, in elements.
    pub preroll_elements: usize,
    pub chunk_capacity: usize,
    pub chunk_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            tempo: 120.0,
            beats_per_measure: 4,
            preroll_elements: 4_800, // 100ms mono at 48kHz
            chunk_capacity: 48_000,
            chunk_count: 128,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if !(self.tempo > 0.0) {
            return Err(ConfigError::InvalidTempo);
        }
        if self.beats_per_measure == 0 {
            return Err(ConfigError::ZeroBeatsPerMeasure);
        }
        // The recycle target must be able to serve the whole pre-roll from
        // its two chunks; requiring one chunk's worth keeps that trivially true.
        if self.preroll_elements > self.chunk_capacity {
            return Err(ConfigError::PrerollTooLong {
                preroll: self.preroll_elements,
                chunk_capacity: self.chunk_capacity,
            });
        }
        Ok(())
    }

    pub fn arena(&self) -> ArenaConfig {
        ArenaConfig {
            chunk_capacity: self.chunk_capacity,
            chunk_count: self.chunk_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn oversized_preroll_is_rejected() {
        let config = SessionConfig {
            preroll_elements: 48_001,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PrerollTooLong { .. })
        ));
    }

    #[test]
    fn zero_fields_are_rejected() {
        let config = SessionConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroSampleRate)));

        let config = SessionConfig {
            tempo: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTempo)));
    }
}
