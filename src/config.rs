use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ListenerError, Result};

// ─── Parameter keys ──────────────────────────────────────────────

pub const KEY_TEST_NAME: &str = "testName";
pub const KEY_NODE_NAME: &str = "nodeName";
pub const KEY_RUN_ID: &str = "runId";
pub const KEY_SAMPLERS_LIST: &str = "samplersList";
pub const KEY_USE_REGEX_FOR_SAMPLER_LIST: &str = "useRegexForSamplerList";
pub const KEY_RECORD_SUB_SAMPLES: &str = "recordSubSamples";
pub const KEY_DISABLED: &str = "disabled";

pub const KEY_INFLUX_DB_HOST: &str = "influxDBHost";
pub const KEY_INFLUX_DB_PORT: &str = "influxDBPort";
pub const KEY_INFLUX_DB_USER: &str = "influxDBUser";
pub const KEY_INFLUX_DB_PASSWORD: &str = "influxDBPassword";
pub const KEY_INFLUX_DB_DATABASE: &str = "influxDBDatabase";
pub const KEY_RETENTION_POLICY: &str = "retentionPolicy";

// ─── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 8086;
pub const DEFAULT_DATABASE: &str = "jmeter";
pub const DEFAULT_RETENTION_POLICY: &str = "autogen";

/// Writer flushes once this many points are buffered...
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// ...or this often, whichever comes first.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(5);
/// Points queued for the writer before `emit` starts dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// How long teardown waits for an in-flight flusher firing.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

// ─── Config types ────────────────────────────────────────────────

/// Everything the listener reads at setup. Fixed for the run.
///
/// Deserializes from JSON with camelCase keys matching the engine
/// parameter names; absent keys take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenerConfig {
    pub test_name: String,
    pub node_name: String,
    pub run_id: String,

    /// Regex, or `;`-separated labels when `use_regex_for_sampler_list` is off
    pub samplers_list: String,
    pub use_regex_for_sampler_list: bool,
    /// Expand each sample's sub-results into their own samples
    pub record_sub_samples: bool,

    /// Turns every listener entry point into a logged no-op
    pub disabled: bool,

    #[serde(flatten)]
    pub influx: InfluxConfig,

    #[serde(skip)]
    pub timing: TimingConfig,
}

/// Connection settings for the InfluxDB 1.x HTTP API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    #[serde(rename = "influxDBHost")]
    pub host: String,
    #[serde(rename = "influxDBPort")]
    pub port: u16,
    #[serde(rename = "influxDBUser")]
    pub user: String,
    #[serde(rename = "influxDBPassword")]
    pub password: String,
    #[serde(rename = "influxDBDatabase")]
    pub database: String,
    #[serde(rename = "retentionPolicy")]
    pub retention_policy: String,
}

/// Cadences of the writer and flusher. Not exposed as engine parameters.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub queue_capacity: usize,
    pub flush_delay: Duration,
    pub flush_interval: Duration,
    pub shutdown_grace: Duration,
}

// ─── Defaults impls ──────────────────────────────────────────────

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            test_name: "Test".into(),
            node_name: "Test-Node".into(),
            run_id: "R001".into(),
            samplers_list: ".*".into(),
            use_regex_for_sampler_list: true,
            record_sub_samples: false,
            disabled: false,
            influx: InfluxConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            database: DEFAULT_DATABASE.into(),
            retention_policy: DEFAULT_RETENTION_POLICY.into(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: DEFAULT_BATCH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_delay: DEFAULT_FLUSH_DELAY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

// ─── Engine parameter surface ────────────────────────────────────

impl ListenerConfig {
    /// Every recognised parameter with its default, in the order an engine
    /// would list them in its configuration UI.
    pub fn default_parameters() -> Vec<(&'static str, String)> {
        let d = Self::default();
        vec![
            (KEY_TEST_NAME, d.test_name),
            (KEY_NODE_NAME, d.node_name),
            (KEY_RUN_ID, d.run_id),
            (KEY_INFLUX_DB_HOST, d.influx.host),
            (KEY_INFLUX_DB_PORT, d.influx.port.to_string()),
            (KEY_INFLUX_DB_USER, d.influx.user),
            (KEY_INFLUX_DB_PASSWORD, d.influx.password),
            (KEY_INFLUX_DB_DATABASE, d.influx.database),
            (KEY_RETENTION_POLICY, d.influx.retention_policy),
            (KEY_SAMPLERS_LIST, d.samplers_list),
            (KEY_USE_REGEX_FOR_SAMPLER_LIST, d.use_regex_for_sampler_list.to_string()),
            (KEY_RECORD_SUB_SAMPLES, d.record_sub_samples.to_string()),
            (KEY_DISABLED, d.disabled.to_string()),
        ]
    }

    /// Read the engine's string key/value parameters. Missing keys fall
    /// back to the defaults; booleans are `true` case-insensitively and
    /// `false` otherwise.
    pub fn from_parameters(params: &HashMap<String, String>) -> Result<Self> {
        let d = Self::default();
        let text = |key: &str, default: String| params.get(key).cloned().unwrap_or(default);
        let flag = |key: &str, default: bool| {
            params
                .get(key)
                .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
        };

        let port = match params.get(KEY_INFLUX_DB_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ListenerError::InvalidParameter {
                    key: KEY_INFLUX_DB_PORT,
                    value: raw.clone(),
                })?,
            None => d.influx.port,
        };

        Ok(Self {
            test_name: text(KEY_TEST_NAME, d.test_name),
            node_name: text(KEY_NODE_NAME, d.node_name),
            run_id: text(KEY_RUN_ID, d.run_id),
            samplers_list: text(KEY_SAMPLERS_LIST, d.samplers_list),
            use_regex_for_sampler_list: flag(
                KEY_USE_REGEX_FOR_SAMPLER_LIST,
                d.use_regex_for_sampler_list,
            ),
            record_sub_samples: flag(KEY_RECORD_SUB_SAMPLES, d.record_sub_samples),
            disabled: flag(KEY_DISABLED, d.disabled),
            influx: InfluxConfig {
                host: text(KEY_INFLUX_DB_HOST, d.influx.host),
                port,
                user: text(KEY_INFLUX_DB_USER, d.influx.user),
                password: text(KEY_INFLUX_DB_PASSWORD, d.influx.password),
                database: text(KEY_INFLUX_DB_DATABASE, d.influx.database),
                retention_policy: text(KEY_RETENTION_POLICY, d.influx.retention_policy),
            },
            timing: d.timing,
        })
    }
}

impl InfluxConfig {
    /// Base URL of the HTTP API, e.g. `http://localhost:8086`.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn missing_parameters_take_defaults() {
        let cfg = ListenerConfig::from_parameters(&HashMap::new()).unwrap();
        assert_eq!(cfg.test_name, "Test");
        assert_eq!(cfg.run_id, "R001");
        assert_eq!(cfg.samplers_list, ".*");
        assert!(cfg.use_regex_for_sampler_list);
        assert!(!cfg.record_sub_samples);
        assert!(!cfg.disabled);
        assert_eq!(cfg.influx.url(), "http://localhost:8086");
        assert_eq!(cfg.influx.database, "jmeter");
        assert_eq!(cfg.influx.retention_policy, "autogen");
    }

    #[test]
    fn parses_engine_strings() {
        let cfg = ListenerConfig::from_parameters(&params(&[
            ("testName", "Checkout"),
            ("influxDBHost", "influx.internal"),
            ("influxDBPort", " 9086 "),
            ("useRegexForSamplerList", "FALSE"),
            ("recordSubSamples", "True"),
            ("disabled", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.test_name, "Checkout");
        assert_eq!(cfg.influx.url(), "http://influx.internal:9086");
        assert!(!cfg.use_regex_for_sampler_list);
        assert!(cfg.record_sub_samples);
        // Only "true" enables a flag
        assert!(!cfg.disabled);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ListenerConfig::from_parameters(&params(&[("influxDBPort", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ListenerError::InvalidParameter { key: KEY_INFLUX_DB_PORT, .. }
        ));
    }

    #[test]
    fn default_parameters_round_trip() {
        let listed: HashMap<String, String> = ListenerConfig::default_parameters()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        assert_eq!(listed.len(), 13);

        let cfg = ListenerConfig::from_parameters(&listed).unwrap();
        assert_eq!(cfg.node_name, "Test-Node");
        assert!(cfg.use_regex_for_sampler_list);
        assert!(!cfg.record_sub_samples);
    }

    #[test]
    fn deserializes_json_with_defaults() {
        let cfg: ListenerConfig = serde_json::from_str(
            r#"{ "testName": "Soak", "recordSubSamples": true, "influxDBPort": 8087 }"#,
        )
        .unwrap();
        assert_eq!(cfg.test_name, "Soak");
        assert!(cfg.record_sub_samples);
        assert_eq!(cfg.influx.port, 8087);
        assert_eq!(cfg.influx.database, "jmeter");
        assert_eq!(cfg.timing.batch_size, DEFAULT_BATCH_SIZE);
    }
}
