//! Configuration surface (spec §6), merged in precedence order:
//! explicit overrides > environment variables > config file > defaults.
//!
//! REDESIGN FLAG (spec §9): the source's loosely-typed CLI config objects
//! become this explicit, validated struct; unknown fields are rejected
//! with `ValidationFailure` rather than silently ignored.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedProvider {
    Local,
    HostedA,
    HostedB,
    Mock,
    None,
}

impl EmbedProvider {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "local" => Ok(EmbedProvider::Local),
            "hosted-a" => Ok(EmbedProvider::HostedA),
            "hosted-b" => Ok(EmbedProvider::HostedB),
            "mock" => Ok(EmbedProvider::Mock),
            "none" => Ok(EmbedProvider::None),
            other => Err(Error::validation(format!(
                "unknown embedProvider {:?}; expected local|hosted-a|hosted-b|mock|none",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMethod {
    Lexical,
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeCapPolicy {
    Unlimited,
    DropLowestScore,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub embed_provider: EmbedProvider,
    pub semantic_threshold: f32,
    pub tag_threshold: f32,
    pub max_accepted_degree: u32,
    pub degree_cap_policy: DegreeCapPolicy,
    pub tag_method: TagMethod,
    pub max_tags: usize,
    pub hosted_a_api_key: Option<String>,
    pub hosted_b_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            embed_provider: EmbedProvider::Local,
            semantic_threshold: 0.5,
            tag_threshold: 0.3,
            max_accepted_degree: 0,
            degree_cap_policy: DegreeCapPolicy::Unlimited,
            tag_method: TagMethod::Lexical,
            max_tags: 8,
            hosted_a_api_key: None,
            hosted_b_api_key: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs_home().join(".forest").join("forest.db")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Recognized keys, used to reject unknown overrides/env vars with
/// `ValidationFailure` instead of silently ignoring them.
const RECOGNIZED_KEYS: &[&str] = &[
    "dbPath",
    "embedProvider",
    "semanticThreshold",
    "tagThreshold",
    "maxAcceptedDegree",
    "tagMethod",
    "hostedAApiKey",
    "hostedBApiKey",
    // presentation-only, consumed by renderers, accepted but inert here
    "colorScheme",
    "markdown.width",
    "markdown.reflowText",
];

impl Config {
    /// Applies a set of raw string overrides (as would come from a config
    /// file or `--set key=value` CLI flags) on top of `self`.
    pub fn apply_overrides(mut self, overrides: &HashMap<String, String>) -> Result<Self> {
        for (key, value) in overrides {
            if !RECOGNIZED_KEYS.contains(&key.as_str()) {
                return Err(Error::validation(format!("unknown config option {:?}", key)));
            }
            match key.as_str() {
                "dbPath" => self.db_path = PathBuf::from(value),
                "embedProvider" => self.embed_provider = EmbedProvider::parse(value)?,
                "semanticThreshold" => {
                    self.semantic_threshold = parse_unit_float(key, value)?;
                }
                "tagThreshold" => {
                    self.tag_threshold = parse_unit_float(key, value)?;
                }
                "maxAcceptedDegree" => {
                    let cap: u32 = value
                        .parse()
                        .map_err(|_| Error::validation(format!("invalid maxAcceptedDegree {:?}", value)))?;
                    self.max_accepted_degree = cap;
                    self.degree_cap_policy = if cap == 0 {
                        DegreeCapPolicy::Unlimited
                    } else {
                        DegreeCapPolicy::DropLowestScore
                    };
                }
                "tagMethod" => {
                    self.tag_method = match value.as_str() {
                        "lexical" => TagMethod::Lexical,
                        "llm" => TagMethod::Llm,
                        other => {
                            return Err(Error::validation(format!("unknown tagMethod {:?}", other)))
                        }
                    };
                }
                "hostedAApiKey" => self.hosted_a_api_key = Some(value.clone()),
                "hostedBApiKey" => self.hosted_b_api_key = Some(value.clone()),
                _ => {} // presentation-only keys, accepted and ignored
            }
        }
        Ok(self)
    }

    /// Merges environment variables prefixed `FOREST_` (e.g.
    /// `FOREST_SEMANTIC_THRESHOLD`) on top of `self`.
    pub fn apply_env(self) -> Result<Self> {
        let mut overrides = HashMap::new();
        let env_map: &[(&str, &str)] = &[
            ("FOREST_DB_PATH", "dbPath"),
            ("FOREST_EMBED_PROVIDER", "embedProvider"),
            ("FOREST_SEMANTIC_THRESHOLD", "semanticThreshold"),
            ("FOREST_TAG_THRESHOLD", "tagThreshold"),
            ("FOREST_MAX_ACCEPTED_DEGREE", "maxAcceptedDegree"),
            ("FOREST_TAG_METHOD", "tagMethod"),
            ("FOREST_HOSTED_A_API_KEY", "hostedAApiKey"),
            ("FOREST_HOSTED_B_API_KEY", "hostedBApiKey"),
        ];
        for (env_key, cfg_key) in env_map {
            if let Ok(value) = std::env::var(env_key) {
                overrides.insert(cfg_key.to_string(), value);
            }
        }
        self.apply_overrides(&overrides)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.semantic_threshold) {
            return Err(Error::validation("semanticThreshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.tag_threshold) {
            return Err(Error::validation("tagThreshold must be in [0, 1]"));
        }
        if self.max_tags == 0 {
            return Err(Error::validation("max_tags must be positive"));
        }
        Ok(())
    }
}

fn parse_unit_float(key: &str, value: &str) -> Result<f32> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| Error::validation(format!("invalid {} {:?}", key, value)))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(Error::validation(format!("{} must be in [0, 1], got {}", key, parsed)));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_option() {
        let mut overrides = HashMap::new();
        overrides.insert("bogusOption".to_string(), "1".to_string());
        let err = Config::default().apply_overrides(&overrides).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::ValidationFailure);
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let mut overrides = HashMap::new();
        overrides.insert("semanticThreshold".to_string(), "1.5".to_string());
        assert!(Config::default().apply_overrides(&overrides).is_err());
    }

    #[test]
    fn zero_degree_cap_means_unlimited() {
        let mut overrides = HashMap::new();
        overrides.insert("maxAcceptedDegree".to_string(), "0".to_string());
        let cfg = Config::default().apply_overrides(&overrides).unwrap();
        assert_eq!(cfg.degree_cap_policy, DegreeCapPolicy::Unlimited);
    }
}
