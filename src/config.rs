use std::path::Path;

use indexmap::IndexMap;
use reqwest::Url;
use serde::{Deserialize, Deserializer};

use crate::constants::{
    DEFAULT_THROTTLE_RETRY_MAX_COUNT, DEFAULT_THROTTLE_WAIT_MAX_SECONDS, IQAIR_API_BASE,
};
use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub main: MainConfig,
    pub influx: InfluxConfig,
    pub iqair: IqAirConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    /// Log level name: DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[serde(default = "default_log_verbosity")]
    pub logverbosity: String,
    /// Seconds between polling cycles; 0 runs a single cycle and exits
    #[serde(default)]
    pub loop_seconds: u64,
}

fn default_log_verbosity() -> String {
    "INFO".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IqAirConfig {
    #[serde(default = "default_api")]
    pub api: String,
    /// Either a single `apikey` or a list under `apikeys`
    #[serde(alias = "apikey", deserialize_with = "one_or_many")]
    pub apikeys: Vec<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub measurement_weather: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub measurement_pollution: Option<String>,
    #[serde(default = "default_retry_max_count")]
    pub throttle_retry_max_count: u32,
    #[serde(default = "default_wait_max_seconds")]
    pub throttle_wait_max_seconds: u64,
    /// Ordered so locations are polled in file order
    #[serde(default)]
    pub locations: IndexMap<String, LocationConfig>,
}

fn default_api() -> String {
    IQAIR_API_BASE.to_string()
}

fn default_retry_max_count() -> u32 {
    DEFAULT_THROTTLE_RETRY_MAX_COUNT
}

fn default_wait_max_seconds() -> u64 {
    DEFAULT_THROTTLE_WAIT_MAX_SECONDS
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub country: String,
    pub state: String,
    pub city: String,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(key) => vec![key],
        OneOrMany::Many(keys) => keys,
    })
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|name| !name.trim().is_empty()))
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing(path.to_path_buf())
            } else {
                ConfigError::Io(path.to_path_buf(), e)
            }
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let iqair = &self.iqair;
        if iqair.apikeys.is_empty() {
            return Err(ConfigError::Invalid("iqair.apikeys must list at least one key".into()));
        }
        if iqair.apikeys.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("iqair.apikeys contains a blank key".into()));
        }
        if iqair.throttle_wait_max_seconds == 0 {
            return Err(ConfigError::Invalid(
                "iqair.throttle_wait_max_seconds must be at least 1".into(),
            ));
        }
        Url::parse(&iqair.api)
            .map_err(|e| ConfigError::Invalid(format!("iqair.api '{}': {e}", iqair.api)))?;
        Url::parse(&self.influx.url)
            .map_err(|e| ConfigError::Invalid(format!("influx.url '{}': {e}", self.influx.url)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
main:
  loop_seconds: 0
influx:
  url: http://localhost:8086
  org: home
  bucket: iqair
  token: secret
iqair:
  apikey: only-key
  measurement_weather: weather
  locations:
    home:
      country: USA
      state: California
      city: Los Angeles
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.main.logverbosity, "INFO");
        assert_eq!(config.main.loop_seconds, 0);
        assert_eq!(config.iqair.api, IQAIR_API_BASE);
        assert_eq!(config.iqair.apikeys, vec!["only-key".to_string()]);
        assert_eq!(config.iqair.measurement_weather.as_deref(), Some("weather"));
        assert_eq!(config.iqair.measurement_pollution, None);
        assert_eq!(config.iqair.throttle_retry_max_count, DEFAULT_THROTTLE_RETRY_MAX_COUNT);
        assert_eq!(config.iqair.throttle_wait_max_seconds, DEFAULT_THROTTLE_WAIT_MAX_SECONDS);
        assert_eq!(config.iqair.locations["home"].city, "Los Angeles");
    }

    #[test]
    fn test_parse_full_config_keeps_location_order() {
        let yaml = r#"
main:
  logverbosity: DEBUG
  loop_seconds: 600
influx:
  url: http://influx:8086
  org: home
  bucket: iqair
  token: secret
iqair:
  api: http://localhost:9000/v2
  apikeys: [key-a, key-b]
  measurement_weather: ""
  measurement_pollution: pollution
  throttle_retry_max_count: 1
  throttle_wait_max_seconds: 5
  locations:
    zurich: {country: Switzerland, state: Zurich, city: Zurich}
    amsterdam: {country: Netherlands, state: North Holland, city: Amsterdam}
    berlin: {country: Germany, state: Berlin, city: Berlin}
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.main.logverbosity, "DEBUG");
        assert_eq!(config.main.loop_seconds, 600);
        assert_eq!(config.iqair.apikeys.len(), 2);
        assert_eq!(config.iqair.measurement_weather, None);
        assert_eq!(config.iqair.measurement_pollution.as_deref(), Some("pollution"));
        assert_eq!(config.iqair.throttle_retry_max_count, 1);
        let names: Vec<&str> = config.iqair.locations.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zurich", "amsterdam", "berlin"]);
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let yaml = "main:\n  loop_seconds: 0\n";
        assert!(matches!(Config::parse(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_key_list_rejected() {
        let yaml = MINIMAL.replace("apikey: only-key", "apikeys: []");
        assert!(matches!(Config::parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_blank_key_rejected() {
        let yaml = MINIMAL.replace("apikey: only-key", "apikeys: [good, \" \"]");
        assert!(matches!(Config::parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_wait_rejected() {
        let yaml = MINIMAL.replace(
            "apikey: only-key",
            "apikey: only-key\n  throttle_wait_max_seconds: 0",
        );
        assert!(matches!(Config::parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_api_url_rejected() {
        let yaml = MINIMAL.replace("apikey: only-key", "apikey: only-key\n  api: not a url");
        assert!(matches!(Config::parse(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/iqair-influx/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
