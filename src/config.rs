use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub pipeline: PipelineConfig,
    pub duplex: DuplexConfig,
}

/// Server bind configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Audio buffering and silence gating configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub vad_threshold: f32,
    pub silence_duration_ms: u32,
    pub min_speech_ms: u32,
    pub max_buffer_ms: u32,
}

/// Incremental pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_language: String,
    pub source_language: String,
    pub asr_interval_ms: u32,
    pub drafts_per_refine: u32,
    pub max_context_turns: usize,
    pub idle_refine_secs: u64,
}

/// Full-duplex frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplexConfig {
    pub sample_rate: u32,
    pub frame_rate: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: defaults::INPUT_SAMPLE_RATE,
            vad_threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            max_buffer_ms: defaults::MAX_BUFFER_MS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_language: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
            source_language: defaults::DEFAULT_SOURCE_LANGUAGE.to_string(),
            asr_interval_ms: defaults::ASR_INTERVAL_MS,
            drafts_per_refine: defaults::DRAFTS_PER_REFINE,
            max_context_turns: defaults::MAX_CONTEXT_TURNS,
            idle_refine_secs: defaults::IDLE_REFINE_SECS,
        }
    }
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::DUPLEX_SAMPLE_RATE,
            frame_rate: defaults::DUPLEX_FRAME_RATE,
        }
    }
}

impl DuplexConfig {
    /// Samples per full-duplex frame.
    pub fn frame_size(&self) -> usize {
        (self.sample_rate as f32 / self.frame_rate) as usize
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXRELAY_HOST → server.host
    /// - VOXRELAY_PORT → server.port
    /// - VOXRELAY_TARGET_LANGUAGE → pipeline.target_language
    /// - VOXRELAY_SOURCE_LANGUAGE → pipeline.source_language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("VOXRELAY_HOST")
            && !host.is_empty()
        {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("VOXRELAY_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }

        if let Ok(target) = std::env::var("VOXRELAY_TARGET_LANGUAGE")
            && !target.is_empty()
        {
            self.pipeline.target_language = target;
        }

        if let Ok(source) = std::env::var("VOXRELAY_SOURCE_LANGUAGE")
            && !source.is_empty()
        {
            self.pipeline.source_language = source;
        }

        self
    }

    /// Validate cross-field constraints
    fn validate(&self) -> anyhow::Result<()> {
        if self.audio.input_sample_rate == 0 {
            anyhow::bail!("audio.input_sample_rate must be positive");
        }
        if self.audio.min_speech_ms >= self.audio.max_buffer_ms {
            anyhow::bail!("audio.min_speech_ms must be below audio.max_buffer_ms");
        }
        if !(0.0..=1.0).contains(&self.audio.vad_threshold) {
            anyhow::bail!("audio.vad_threshold must be within [0, 1]");
        }
        if self.duplex.frame_rate <= 0.0 {
            anyhow::bail!("duplex.frame_rate must be positive");
        }
        if self.pipeline.drafts_per_refine == 0 {
            anyhow::bail!("pipeline.drafts_per_refine must be positive");
        }
        Ok(())
    }
}
