use crate::{DeviceCapability, FallbackPolicy, MouthError, Result};
use crate::STANDARD_RATES;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a synthesis request needs that is not the text itself.
///
/// Loaded from TOML; every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MouthConfig {
    /// Synthesis engine executable
    pub piper_binary: PathBuf,
    /// Voice model; discovered in `model_dir` when unset
    pub model: Option<PathBuf>,
    /// Voice model config; discovered next to the model when unset
    pub model_config: Option<PathBuf>,
    pub model_dir: PathBuf,
    /// Playback rates to try, highest fidelity first
    pub candidate_rates: Vec<u32>,
    pub fallback_policy: FallbackPolicy,
    /// Ask the output device which candidate rates it supports
    pub query_device_rates: bool,
    /// Keep a copy of each synthesized container here
    pub keep_output: Option<PathBuf>,
}

impl Default for MouthConfig {
    fn default() -> Self {
        MouthConfig {
            piper_binary: PathBuf::from("piper/piper"),
            model: None,
            model_config: None,
            model_dir: PathBuf::from("."),
            candidate_rates: STANDARD_RATES.to_vec(),
            fallback_policy: FallbackPolicy::default(),
            query_device_rates: true,
            keep_output: None,
        }
    }
}

impl MouthConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MouthConfig =
            toml::from_str(text).map_err(|e| MouthError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            MouthError::Config(format!("{}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidate_rates.is_empty() {
            return Err(MouthError::Config(String::from(
                "At least one candidate rate is required",
            )));
        }

        if self.candidate_rates.contains(&0) {
            return Err(MouthError::Config(String::from(
                "Candidate rates must be non-zero",
            )));
        }

        if self.model_config.is_some() && self.model.is_none() {
            return Err(MouthError::Config(String::from(
                "model_config given without model",
            )));
        }

        Ok(())
    }

    /// Capability built from the configured candidates alone.
    pub fn capability(&self) -> DeviceCapability {
        DeviceCapability::new(self.candidate_rates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = MouthConfig::from_toml_str("").unwrap();
        assert_eq!(config, MouthConfig::default());
        assert_eq!(config.candidate_rates, vec![48000, 44100, 22050, 16000]);
    }

    #[test]
    fn test_parse_full() {
        let config = MouthConfig::from_toml_str(
            r#"
            piper_binary = "/opt/piper/piper"
            model = "voices/en_US-amy.onnx"
            model_config = "voices/en_US-amy.onnx.json"
            candidate_rates = [44100, 16000]
            fallback_policy = "float-first"
            query_device_rates = false
            keep_output = "last.wav"
            "#,
        )
        .unwrap();

        assert_eq!(config.piper_binary, PathBuf::from("/opt/piper/piper"));
        assert_eq!(config.fallback_policy, FallbackPolicy::FloatFirst);
        assert_eq!(config.capability().candidate_rates, vec![44100, 16000]);
        assert!(!config.query_device_rates);
        assert_eq!(config.keep_output, Some(PathBuf::from("last.wav")));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(MouthConfig::from_toml_str("candidate_rates = []").is_err());
        assert!(MouthConfig::from_toml_str("candidate_rates = [0]").is_err());
        assert!(MouthConfig::from_toml_str("volume = 11").is_err());
        assert!(MouthConfig::from_toml_str("model_config = \"a.json\"").is_err());
    }
}
