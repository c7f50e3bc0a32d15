use color_eyre::eyre::{ensure, eyre, Result, WrapErr};
use metricscrape::{Labels, ScrapeJob, Target};
use rustc_hash::FxHashSet;
use serde::{de, Deserialize, Deserializer};
use std::{collections::BTreeMap, fs, path::Path, time::Duration};

pub mod api;
pub mod grpc;
pub mod http;

pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

/// Scraper configuration, as read from YAML.
///
/// ```yaml
/// global:
///   scrape_interval: 15s
///   scrape_timeout: 10s
/// scrape_configs:
///   - job_name: node
///     scrape_interval: 5s
///     static_configs:
///       - targets: ["localhost:8080"]
///         labels:
///           env: prod
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub scrape_interval: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub scrape_timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeConfig {
    pub job_name: String,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub scrape_interval: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub scrape_timeout: Option<Duration>,
    #[serde(default)]
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Deserialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).wrap_err("failed to parse config")
    }

    /// Resolves every scrape config into a job, filling intervals and timeouts
    /// from the global section and then from the built-in defaults.
    pub fn jobs(&self) -> Result<Vec<ScrapeJob>> {
        let interval = self
            .global
            .scrape_interval
            .unwrap_or(DEFAULT_SCRAPE_INTERVAL);
        let timeout = self.global.scrape_timeout.unwrap_or(DEFAULT_SCRAPE_TIMEOUT);

        let mut names = FxHashSet::default();
        let mut jobs = Vec::with_capacity(self.scrape_configs.len());
        for sc in &self.scrape_configs {
            ensure!(!sc.job_name.is_empty(), "job_name must not be empty");
            ensure!(
                names.insert(sc.job_name.as_str()),
                "duplicate job_name {:?}",
                sc.job_name
            );
            let job = ScrapeJob {
                name: sc.job_name.clone(),
                interval: sc.scrape_interval.unwrap_or(interval),
                timeout: sc.scrape_timeout.unwrap_or(timeout),
                targets: sc
                    .static_configs
                    .iter()
                    .flat_map(|static_config| {
                        let labels = Labels::new(&static_config.labels);
                        static_config
                            .targets
                            .iter()
                            .map(move |address| Target::new(address.as_str(), labels.clone()))
                    })
                    .collect(),
            };
            ensure!(
                !job.interval.is_zero() && !job.timeout.is_zero(),
                "job {:?}: scrape_interval and scrape_timeout must be positive",
                job.name
            );
            jobs.push(job);
        }
        Ok(jobs)
    }
}

/// Loads and validates the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
    let config = Config::from_yaml(&text).wrap_err_with(|| format!("{}", path.display()))?;
    config
        .jobs()
        .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

/// Parses `500ms`, `15s`, `5m`, `1h`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (number, unit): (&str, fn(u64) -> Duration) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, |m: u64| Duration::from_secs(m.saturating_mul(60)))
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, |h: u64| Duration::from_secs(h.saturating_mul(3600)))
    } else {
        (s, Duration::from_secs)
    };
    number
        .trim()
        .parse::<u64>()
        .map(unit)
        .map_err(|_| eyre!("invalid duration {s:?}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => Ok(Some(Duration::from_secs(secs))),
        Some(Raw::Text(text)) => parse_duration(&text)
            .map(Some)
            .map_err(de::Error::custom),
    }
}
