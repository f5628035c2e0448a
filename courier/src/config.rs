//! Run configuration
//!
//! Every field has a default, so an empty (or absent) YAML file yields a
//! working configuration. The CLI layers its flags on top of the file.

use crate::errors::ConfigError;
use crate::locator::Locators;
use crate::pacing::JitterRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MESSAGING_BASE_URL: &str = "https://web.whatsapp.com";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_AUDIT_LOG: &str = "message_log.csv";

/// How the rendered message reaches the compose surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeMode {
    /// Navigate to the chat, then type the message into the compose box.
    #[default]
    Keystrokes,
    /// Carry the message in the deep link's `text` parameter; only send is clicked.
    Prefill,
}

impl std::str::FromStr for ComposeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keystrokes" | "keys" => Ok(ComposeMode::Keystrokes),
            "prefill" | "link" => Ok(ComposeMode::Prefill),
            other => Err(ConfigError::Invalid(format!(
                "unknown compose mode '{other}' (expected 'keystrokes' or 'prefill')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// How long to wait for the operator to log in.
    pub login_secs: u64,
    /// How long to wait for an opened chat's compose surface.
    pub compose_secs: u64,
    /// How long to wait for the send affordance.
    pub send_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            login_secs: 300,
            compose_secs: 30,
            send_secs: 10,
            poll_interval_ms: 500,
        }
    }
}

impl Timeouts {
    pub fn login(&self) -> Duration {
        Duration::from_secs(self.login_secs)
    }

    pub fn compose(&self) -> Duration {
        Duration::from_secs(self.compose_secs)
    }

    pub fn send(&self) -> Duration {
        Duration::from_secs(self.send_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Which reachability check the connectivity guard runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// HEAD request against `probe_url`.
    #[default]
    Http,
    /// TCP connect to `probe_addr`; for networks that block plain HTTP egress.
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub probe: ProbeKind,
    pub probe_url: String,
    /// `host:port` used by the TCP probe
    pub probe_addr: String,
    pub probe_timeout_secs: u64,
    pub backoff_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe: ProbeKind::default(),
            probe_url: "https://clients3.google.com/generate_204".to_string(),
            probe_addr: "1.1.1.1:53".to_string(),
            probe_timeout_secs: 5,
            backoff_secs: 5,
        }
    }
}

impl ConnectivityConfig {
    /// What the configured probe targets, for display.
    pub fn target(&self) -> String {
        match self.probe {
            ProbeKind::Http => self.probe_url.clone(),
            ProbeKind::Tcp => format!("tcp://{}", self.probe_addr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub messaging_base_url: String,
    pub webdriver_url: String,
    /// Extra browser command-line arguments for new sessions.
    pub browser_args: Vec<String>,
    pub default_country_code: String,
    pub compose_mode: ComposeMode,
    pub timeouts: Timeouts,
    /// Delay between consecutive attempts.
    pub pacing: JitterRange,
    /// Delay after a successful send.
    pub send_jitter: JitterRange,
    pub connectivity: ConnectivityConfig,
    pub audit_log: PathBuf,
    /// Stop attempting once the remote interface appears to have changed shape.
    pub halt_on_structural_error: bool,
    pub locators: Locators,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            messaging_base_url: DEFAULT_MESSAGING_BASE_URL.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            browser_args: Vec::new(),
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            compose_mode: ComposeMode::default(),
            timeouts: Timeouts::default(),
            pacing: JitterRange::from_secs(10.0, 15.0),
            send_jitter: JitterRange::from_secs(1.0, 4.0),
            connectivity: ConnectivityConfig::default(),
            audit_log: PathBuf::from(DEFAULT_AUDIT_LOG),
            halt_on_structural_error: false,
            locators: Locators::default(),
        }
    }
}

impl CourierConfig {
    /// Load configuration from a YAML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_yaml(&text).map_err(|e| match e {
                    ConfigError::Parse { source, .. } => ConfigError::Parse {
                        path: path.display().to_string(),
                        source,
                    },
                    other => other,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        debug!(?path, locators_version = %config.locators.version, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messaging_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "messaging_base_url must not be empty".to_string(),
            ));
        }
        if !self.default_country_code.chars().all(|c| c.is_ascii_digit())
            || self.default_country_code.is_empty()
        {
            return Err(ConfigError::Invalid(format!(
                "default_country_code must be digits only, got '{}'",
                self.default_country_code
            )));
        }
        self.pacing
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("pacing: {e}")))?;
        self.send_jitter
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("send_jitter: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(CourierConfig::from_yaml("").unwrap(), CourierConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = CourierConfig::from_yaml(
            r#"
compose_mode: prefill
default_country_code: "44"
timeouts:
  compose_secs: 60
pacing:
  min_secs: 2
  max_secs: 3
"#,
        )
        .unwrap();
        assert_eq!(config.compose_mode, ComposeMode::Prefill);
        assert_eq!(config.default_country_code, "44");
        assert_eq!(config.timeouts.compose(), Duration::from_secs(60));
        assert_eq!(config.timeouts.send_secs, 10);
        assert_eq!(config.pacing, JitterRange::from_secs(2.0, 3.0));
        assert_eq!(config.messaging_base_url, DEFAULT_MESSAGING_BASE_URL);
        config.validate().unwrap();
    }

    #[test]
    fn test_inverted_pacing_is_rejected() {
        let mut config = CourierConfig::default();
        config.pacing = JitterRange::from_secs(15.0, 10.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_country_code_must_be_digits() {
        let mut config = CourierConfig::default();
        config.default_country_code = "+91".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_compose_mode_from_str() {
        assert_eq!("prefill".parse::<ComposeMode>().unwrap(), ComposeMode::Prefill);
        assert_eq!(
            " Keystrokes ".parse::<ComposeMode>().unwrap(),
            ComposeMode::Keystrokes
        );
        assert!("carrier-pigeon".parse::<ComposeMode>().is_err());
    }

    #[test]
    fn test_tcp_connectivity_selection() {
        let config = CourierConfig::from_yaml(
            r#"
connectivity:
  probe: tcp
  probe_addr: "9.9.9.9:53"
"#,
        )
        .unwrap();
        assert_eq!(config.connectivity.probe, ProbeKind::Tcp);
        assert_eq!(config.connectivity.target(), "tcp://9.9.9.9:53");
        assert_eq!(config.connectivity.backoff_secs, 5);
        assert_eq!(
            CourierConfig::default().connectivity.probe,
            ProbeKind::Http
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = CourierConfig::load(Some(Path::new("/nonexistent/courier.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
