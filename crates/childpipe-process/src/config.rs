use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for a [`crate::ProcessTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// How often a blocked wait re-checks the child for exit.
    #[serde(default = "default_exit_poll_interval", with = "duration_serde")]
    pub exit_poll_interval: Duration,

    /// Default tracing level for binaries embedding the table.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            exit_poll_interval: default_exit_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

impl TableConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: TableConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exit_poll_interval.is_zero() {
            return Err(anyhow!("Exit poll interval must be greater than 0"));
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(anyhow!(
                "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
                self.log_level
            )),
        }
    }
}

fn default_exit_poll_interval() -> Duration {
    Duration::from_millis(25)
}

fn default_log_level() -> String {
    "info".to_string()
}

// Durations are written as "25ms", "2s" or "1m".
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            // Whole milliseconds, rounded up so a nonzero interval stays nonzero.
            let millis = duration.as_nanos().div_ceil(1_000_000);
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let invalid = || format!("Invalid duration: {}", s);
        // "ms" before "s"
        if let Some(num) = s.strip_suffix("ms") {
            num.parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.parse().map_err(|_| invalid())?;
            mins.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid)
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
