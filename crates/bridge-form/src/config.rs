use std::time::Duration;

use figment::{providers::Env, Figment};
use serde::Deserialize;

use crate::error::Error;

/// Runtime settings, read from `BRIDGE_FORM_*` environment variables.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Timeout applied to every metadata request.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Quiet period before amount validation runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Nominal amount handed to the max-amount estimator.
    #[serde(default = "default_max_amount_probe")]
    pub max_amount_probe: u64,
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_amount_probe() -> u64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_ms: default_http_timeout_ms(),
            debounce_ms: default_debounce_ms(),
            max_amount_probe: default_max_amount_probe(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::figment()
            .extract::<Config>()
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn figment() -> Figment {
        Figment::new().merge(Env::prefixed("BRIDGE_FORM_"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
