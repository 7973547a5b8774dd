//! Settings and configuration for the colony coordinator.
//!
//! The coordinator shares a core [`Settings`] block (store location, ports,
//! polling cadence, tracing) and each binary adds its own fields with the
//! [`decl_settings!`] macro in its `settings.rs`.
//!
//! Settings are read from config files and/or env. Files are loaded from
//! `./config/$RUN_ENV/` ($RUN_ENV defaults to `default`): first
//! `$BASE_CONFIG` (defaults to `base`), then `{agent}-partial.json`. Env
//! vars override files; names map 1:1 onto the JSON hierarchy with the
//! prefixes `COL_BASE_*` (shared) and `COL_{AGENT}_*` (agent-specific), so
//! `COL_BASE_POLLERS_INTERVAL=15` overrides `pollers.interval`.

use std::{collections::HashMap, env, sync::Arc};

use config::{Config, Environment, File};
use eyre::Context;
use serde::Deserialize;

use colony_core::AGENT_RPC_PORT;

use crate::CoreMetrics;

/// Tracing subscriber management
pub mod trace;

pub use trace::TracingConfig;

/// Load a settings object from the config locations.
///
/// Configs are loaded in the following precedence order:
///
/// 1. The file specified by the `RUN_ENV` and `BASE_CONFIG` env vars,
///    `config/$RUN_ENV/$BASE_CONFIG`.
/// 2. The file `config/$RUN_ENV/<agent>-partial.json`.
/// 3. Env vars prefixed with `COL_BASE`, shared by all binaries.
/// 4. Env vars prefixed with `COL_<agent>`.
pub fn load_settings_object<'de, T: Deserialize<'de>, S: AsRef<str>>(
    agent_prefix: &str,
    config_file_name: Option<&str>,
    ignore_prefixes: &[S],
) -> eyre::Result<T> {
    let env = env::var("RUN_ENV").unwrap_or_else(|_| "default".into());

    let prefix = format!("COL_{}", agent_prefix).to_ascii_uppercase();

    let filtered_env: HashMap<String, String> = env::vars()
        .filter(|(k, _v)| {
            !ignore_prefixes
                .iter()
                .any(|prefix| k.starts_with(prefix.as_ref()))
        })
        .collect();

    let builder = Config::builder();
    let builder = if let Some(fname) = config_file_name {
        builder.add_source(File::with_name(&format!("./config/{}/{}", env, fname)).required(false))
    } else {
        builder
    };
    let config_deserializer = builder
        .add_source(
            File::with_name(&format!(
                "./config/{}/{}-partial",
                env,
                agent_prefix.to_lowercase()
            ))
            .required(false),
        )
        .add_source(
            Environment::with_prefix("COL_BASE")
                .separator("_")
                .source(Some(filtered_env.clone())),
        )
        .add_source(
            Environment::with_prefix(&prefix)
                .separator("_")
                .source(Some(filtered_env)),
        )
        .build()?;

    Ok(serde_path_to_error::deserialize(config_deserializer)?)
}

/// Polling cadence knobs shared by the stream pollers. All integer-valued so
/// they can be set via env vars; parsed on access with system defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerSettings {
    /// Seconds between poll cycles. Default 30.
    pub interval: Option<String>,
    /// Seconds between cleanup sweeps. Default 3600.
    pub cleanupinterval: Option<String>,
}

impl PollerSettings {
    /// Seconds between poll cycles.
    pub fn interval_secs(&self) -> eyre::Result<u64> {
        parse_or(&self.interval, 30, "pollers.interval")
    }

    /// Seconds between cleanup sweeps.
    pub fn cleanup_interval_secs(&self) -> eyre::Result<u64> {
        parse_or(&self.cleanupinterval, 3600, "pollers.cleanupinterval")
    }
}

fn parse_or(v: &Option<String>, default: u64, what: &str) -> eyre::Result<u64> {
    v.as_deref()
        .map(|s| s.parse::<u64>().with_context(|| format!("invalid {what}")))
        .transpose()
        .map(|p| p.unwrap_or(default))
}

/// Core settings shared by all colony binaries. Usually wrapped by a
/// `decl_settings!`-generated struct that flattens this block.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Identity of this colony; labels metrics and the storage root.
    pub colonyid: Option<String>,
    /// Connection string of the embedded analytic store.
    pub db: String,
    /// Port to listen for prometheus scrape requests.
    pub metrics: Option<String>,
    /// Port of the colony HTTP API.
    pub api: Option<String>,
    /// Port agents expose their RPC surface on; defaults to the system
    /// constant.
    pub agentrpcport: Option<String>,
    /// Polling cadence.
    #[serde(default)]
    pub pollers: PollerSettings,
    /// The tracing configuration.
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Settings {
    /// The colony id, defaulting to `default`.
    pub fn colony_id(&self) -> &str {
        self.colonyid.as_deref().unwrap_or("default")
    }

    /// The port agents expose their RPC surface on.
    pub fn agent_rpc_port(&self) -> eyre::Result<u16> {
        self.agentrpcport
            .as_deref()
            .map(|p| p.parse::<u16>().context("invalid agentrpcport"))
            .transpose()
            .map(|p| p.unwrap_or(AGENT_RPC_PORT))
    }

    /// The colony API port, when serving is enabled.
    pub fn api_port(&self) -> eyre::Result<Option<u16>> {
        self.api
            .as_deref()
            .map(|p| p.parse::<u16>().context("invalid api port"))
            .transpose()
    }

    /// Create the core metrics registry from the settings given the name of
    /// the agent.
    pub fn metrics(&self, name: &str) -> eyre::Result<Arc<CoreMetrics>> {
        Ok(Arc::new(CoreMetrics::new(
            name,
            self.metrics
                .as_ref()
                .map(|v| v.parse::<u16>().context("invalid metrics port"))
                .transpose()?,
            prometheus::Registry::new(),
        )?))
    }
}

/// Settings of an agent binary, constructed from config files and env vars.
pub trait NewFromSettings: AsRef<Settings> + Sized {
    /// The error type returned on failures to parse.
    type Error: Into<eyre::Report>;

    /// Create a new instance of these settings by reading the configs and
    /// env vars.
    fn new() -> std::result::Result<Self, Self::Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn poller_settings_defaults() {
        let s = PollerSettings::default();
        assert_eq!(s.interval_secs().unwrap(), 30);
        assert_eq!(s.cleanup_interval_secs().unwrap(), 3600);

        let s = PollerSettings {
            interval: Some("5".into()),
            cleanupinterval: Some("60".into()),
        };
        assert_eq!(s.interval_secs().unwrap(), 5);
        assert_eq!(s.cleanup_interval_secs().unwrap(), 60);

        let s = PollerSettings {
            interval: Some("not a number".into()),
            cleanupinterval: None,
        };
        assert!(s.interval_secs().is_err());
    }

    #[test]
    fn agent_port_defaults_to_system_constant() {
        let s = Settings::default();
        assert_eq!(s.agent_rpc_port().unwrap(), AGENT_RPC_PORT);
    }
}
