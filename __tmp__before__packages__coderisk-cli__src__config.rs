use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Fast,
    Balanced,
    Thorough,
}

impl Preset {
    fn baseline(self) -> RiskConfig {
        match self {
            Preset::Fast => RiskConfig {
                preset: self,
                history_window_days: 30,
                min_co_change_frequency: 0.5,
                stage_timeout_ms: 250,
                llm_base_url: "https://api.openai.com/v1".to_string(),
                llm_model: "gpt-4o-mini".to_string(),
            },
            Preset::Balanced => RiskConfig {
                preset: self,
                history_window_days: 90,
                min_co_change_frequency: 0.3,
                stage_timeout_ms: 500,
                llm_base_url: "https://api.openai.com/v1".to_string(),
                llm_model: "gpt-4o".to_string(),
            },
            Preset::Thorough => RiskConfig {
                preset: self,
                history_window_days: 180,
                min_co_change_frequency: 0.2,
                stage_timeout_ms: 2000,
                llm_base_url: "https://api.openai.com/v1".to_string(),
                llm_model: "gpt-4o".to_string(),
            },
        }
    }
}

/// A partial override layer read from a TOML config file -- the "9%" tier
/// of the configuration system. Every field is optional; only present
/// fields override the preset baseline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub preset: Option<Preset>,
    pub history_window_days: Option<i64>,
    pub min_co_change_frequency: Option<f64>,
    pub stage_timeout_ms: Option<u64>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub preset: Preset,
    pub history_window_days: i64,
    pub min_co_change_frequency: f64,
    pub stage_timeout_ms: u64,
    pub llm_base_url: String,
    pub llm_model: String,
}

impl RiskConfig {
    /// Resolves config in three tiers: a preset baseline (90% of users
    /// never go further), a TOML file override (9%), and explicit CLI
    /// flags layered on top by the caller (the last 1%).
    pub fn load(preset: Preset, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = preset.baseline();

        if let Some(path) = config_path {
            if path.exists() {
                let raw = std::fs::read_to_string(path)?;
                let overrides: ConfigOverrides = toml::from_str(&raw)?;
                config.apply(overrides);
            }
        }

        Ok(config)
    }

    fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(preset) = overrides.preset {
            *self = preset.baseline();
        }
        if let Some(v) = overrides.history_window_days {
            self.history_window_days = v;
        }
        if let Some(v) = overrides.min_co_change_frequency {
            self.min_co_change_frequency = v;
        }
        if let Some(v) = overrides.stage_timeout_ms {
            self.stage_timeout_ms = v;
        }
        if let Some(v) = overrides.llm_base_url {
            self.llm_base_url = v;
        }
        if let Some(v) = overrides.llm_model {
            self.llm_model = v;
        }
    }
}

/// Resolves the LLM API key from the environment, preferring a
/// tool-specific variable over the generic provider one so a user running
/// several tools against the same provider can scope this one separately.
pub fn resolve_api_key() -> Option<String> {
    std::env::var("CODERISK_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_preset_is_the_default_baseline() {
        let config = RiskConfig::load(Preset::Balanced, None).unwrap();
        assert_eq!(config.history_window_days, 90);
    }

    #[test]
    fn file_override_replaces_individual_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "history_window_days = 45\n").unwrap();

        let config = RiskConfig::load(Preset::Balanced, Some(&path)).unwrap();
        assert_eq!(config.history_window_days, 45);
        assert_eq!(config.min_co_change_frequency, 0.3);
    }
}


