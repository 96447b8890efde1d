//! # Config Module
//!
//! Scan settings and the per-run capability set derived from them.
//!
//! ## Sources
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional settings file, then process environment variables
//! (`SCAN_SMALL_INPUT_FALLBACK_MAX` -> `scan_small_input_fallback_max`).
//!
//! ## Environment Gating
//! Everything that weakens the download hardening or leaks internals
//! (host overrides, fixture bytes, explain output) is decided once per run
//! in [`RunCapabilities::resolve`]. In `prod` all of it is off.

use crate::core::comparator::SimilarityThresholds;
use crate::core::pipeline::CostRates;
use crate::error::EngineError;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment name that switches off every development affordance
pub const PRODUCTION_ENVIRONMENT: &str = "prod";

/// Engine settings, process-wide and read-only during a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub environment: String,

    pub scan_dhash_threshold_very: u32,
    pub scan_dhash_threshold_possible: u32,
    pub scan_phash_threshold_very: u32,
    pub scan_phash_threshold_possible: u32,

    pub scan_small_input_fallback_max: usize,

    pub scan_cost_per_download: f64,
    pub scan_cost_per_byte_hash: f64,
    pub scan_cost_per_perceptual_hash: f64,
    pub scan_cost_per_comparison: f64,

    #[serde(deserialize_with = "host_list")]
    pub scan_allowed_download_hosts: Vec<String>,
    #[serde(deserialize_with = "host_map")]
    pub scan_download_host_overrides: HashMap<String, String>,

    pub scan_explain: bool,
    pub scan_fixture_bytes_dir: Option<PathBuf>,
    pub scan_fixture_bytes_strict: bool,

    pub scan_download_timeout_seconds: f64,
    pub scan_download_workers: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            scan_dhash_threshold_very: 5,
            scan_dhash_threshold_possible: 10,
            scan_phash_threshold_very: 6,
            scan_phash_threshold_possible: 12,
            scan_small_input_fallback_max: 20,
            scan_cost_per_download: 0.0002,
            scan_cost_per_byte_hash: 0.00001,
            scan_cost_per_perceptual_hash: 0.00005,
            scan_cost_per_comparison: 0.000001,
            scan_allowed_download_hosts: vec![
                "googleusercontent.com".to_string(),
                "photos.google.com".to_string(),
            ],
            scan_download_host_overrides: HashMap::new(),
            scan_explain: false,
            scan_fixture_bytes_dir: None,
            scan_fixture_bytes_strict: false,
            scan_download_timeout_seconds: 30.0,
            scan_download_workers: 8,
        }
    }
}

impl ScanSettings {
    /// Load settings from an optional file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: ScanSettings = builder
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        let rates = [
            ("scan_cost_per_download", self.scan_cost_per_download),
            ("scan_cost_per_byte_hash", self.scan_cost_per_byte_hash),
            ("scan_cost_per_perceptual_hash", self.scan_cost_per_perceptual_hash),
            ("scan_cost_per_comparison", self.scan_cost_per_comparison),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.scan_dhash_threshold_very > self.scan_dhash_threshold_possible {
            return Err(EngineError::Config(
                "scan_dhash_threshold_very must not exceed scan_dhash_threshold_possible".into(),
            ));
        }
        if self.scan_phash_threshold_very > self.scan_phash_threshold_possible {
            return Err(EngineError::Config(
                "scan_phash_threshold_very must not exceed scan_phash_threshold_possible".into(),
            ));
        }
        if self.scan_download_workers == 0 {
            return Err(EngineError::Config(
                "scan_download_workers must be at least 1".into(),
            ));
        }
        if !self.scan_download_timeout_seconds.is_finite() || self.scan_download_timeout_seconds <= 0.0
        {
            return Err(EngineError::Config(
                "scan_download_timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    pub fn thresholds(&self) -> SimilarityThresholds {
        SimilarityThresholds {
            dhash_very: self.scan_dhash_threshold_very,
            dhash_possible: self.scan_dhash_threshold_possible,
            phash_very: self.scan_phash_threshold_very,
            phash_possible: self.scan_phash_threshold_possible,
        }
    }

    pub fn cost_rates(&self) -> CostRates {
        CostRates {
            per_download: self.scan_cost_per_download,
            per_byte_hash: self.scan_cost_per_byte_hash,
            per_perceptual_hash: self.scan_cost_per_perceptual_hash,
            per_comparison: self.scan_cost_per_comparison,
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.scan_download_timeout_seconds)
    }
}

/// What a single run is permitted to do, resolved once from settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCapabilities {
    /// Original host (lowercase) -> replacement host or base URL
    pub host_overrides: HashMap<String, String>,
    /// Overridden hosts skip scheme, allowlist and address checks
    pub allow_override_exceptions: bool,
    pub fixture_bytes_dir: Option<PathBuf>,
    pub fixture_bytes_strict: bool,
    pub explain: bool,
}

impl RunCapabilities {
    pub fn resolve(settings: &ScanSettings, explain_requested: bool) -> Self {
        if settings.is_production() {
            return Self::default();
        }

        let host_overrides = settings.scan_download_host_overrides.clone();
        let allow_override_exceptions = !host_overrides.is_empty();
        let fixture_bytes_dir = settings
            .scan_fixture_bytes_dir
            .as_ref()
            .filter(|dir| !dir.as_os_str().to_string_lossy().trim().is_empty())
            .cloned();

        Self {
            host_overrides,
            allow_override_exceptions,
            fixture_bytes_dir,
            fixture_bytes_strict: settings.scan_fixture_bytes_strict,
            explain: explain_requested || settings.scan_explain,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrText {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrText {
    Map(HashMap<String, String>),
    Text(String),
}

/// Accepts a list, a JSON array string, or a comma-separated string
fn host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match ListOrText::deserialize(deserializer)? {
        ListOrText::List(items) => items,
        ListOrText::Text(text) => {
            let text = text.trim();
            if text.starts_with('[') {
                serde_json::from_str(text).map_err(serde::de::Error::custom)?
            } else {
                text.split(',').map(str::to_string).collect()
            }
        }
    };
    Ok(raw
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect())
}

/// Accepts a map, a JSON object string, or `from:to,from:to`
fn host_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, String> = match MapOrText::deserialize(deserializer)? {
        MapOrText::Map(map) => map,
        MapOrText::Text(text) => {
            let text = text.trim();
            if text.starts_with('{') {
                serde_json::from_str(text).map_err(serde::de::Error::custom)?
            } else {
                text.split(',')
                    .filter_map(|pair| pair.split_once(':'))
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect()
            }
        }
    };
    Ok(raw
        .into_iter()
        .map(|(from, to)| (from.trim().to_lowercase(), to.trim().to_string()))
        .filter(|(from, to)| !from.is_empty() && !to.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_json(json: &str) -> ScanSettings {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = ScanSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.scan_small_input_fallback_max, 20);
        assert!(!settings.is_production());
    }

    #[test]
    fn allowed_hosts_accept_json_array_string() {
        let settings = from_json(
            r#"{"scan_allowed_download_hosts": "[\"lh3.googleusercontent.com\", \"photos.google.com\"]"}"#,
        );
        assert_eq!(
            settings.scan_allowed_download_hosts,
            vec!["lh3.googleusercontent.com", "photos.google.com"]
        );
    }

    #[test]
    fn allowed_hosts_accept_csv() {
        let settings = from_json(
            r#"{"scan_allowed_download_hosts": "lh3.googleusercontent.com, photos.google.com"}"#,
        );
        assert_eq!(
            settings.scan_allowed_download_hosts,
            vec!["lh3.googleusercontent.com", "photos.google.com"]
        );
    }

    #[test]
    fn allowed_hosts_accept_empty_string() {
        let settings = from_json(r#"{"scan_allowed_download_hosts": ""}"#);
        assert!(settings.scan_allowed_download_hosts.is_empty());
    }

    #[test]
    fn host_overrides_accept_csv() {
        let settings = from_json(
            r#"{"scan_download_host_overrides": "example.test:photos.google.com,Foo.test:http://localhost:8001"}"#,
        );
        assert_eq!(
            settings.scan_download_host_overrides.get("example.test").map(String::as_str),
            Some("photos.google.com")
        );
        assert_eq!(
            settings.scan_download_host_overrides.get("foo.test").map(String::as_str),
            Some("http://localhost:8001")
        );
    }

    #[test]
    fn host_overrides_accept_json_object() {
        let settings = from_json(
            r#"{"scan_download_host_overrides": "{\"example.test\":\"photos.google.com\"}"}"#,
        );
        assert_eq!(settings.scan_download_host_overrides.len(), 1);
    }

    #[test]
    fn config_file_layer_is_read() {
        let settings: ScanSettings = Config::builder()
            .add_source(File::from_str(
                r#"{"environment": "staging", "scan_small_input_fallback_max": 5}"#,
                FileFormat::Json,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.environment, "staging");
        assert_eq!(settings.scan_small_input_fallback_max, 5);
        assert_eq!(settings.scan_dhash_threshold_very, 5);
    }

    #[test]
    fn validate_rejects_negative_costs() {
        let settings = ScanSettings {
            scan_cost_per_comparison: -1.0,
            ..ScanSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let settings = ScanSettings {
            scan_dhash_threshold_very: 11,
            ..ScanSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn production_disables_every_affordance() {
        let mut overrides = HashMap::new();
        overrides.insert("example.test".to_string(), "http://localhost:8001".to_string());
        let settings = ScanSettings {
            environment: " PROD ".to_string(),
            scan_download_host_overrides: overrides,
            scan_explain: true,
            scan_fixture_bytes_dir: Some(PathBuf::from("/fixtures")),
            ..ScanSettings::default()
        };

        let caps = RunCapabilities::resolve(&settings, true);

        assert_eq!(caps, RunCapabilities::default());
    }

    #[test]
    fn development_honors_overrides_and_explain() {
        let mut overrides = HashMap::new();
        overrides.insert("example.test".to_string(), "photos.google.com".to_string());
        let settings = ScanSettings {
            scan_download_host_overrides: overrides,
            scan_fixture_bytes_dir: Some(PathBuf::from("  ")),
            ..ScanSettings::default()
        };

        let caps = RunCapabilities::resolve(&settings, true);

        assert!(caps.allow_override_exceptions);
        assert!(caps.explain);
        assert!(caps.fixture_bytes_dir.is_none());
        assert!(!RunCapabilities::resolve(&ScanSettings::default(), false).explain);
    }
}
