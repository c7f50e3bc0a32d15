use std::time::Duration;

use crate::labels::Labels;

/// A named group of targets polled on the same schedule.
///
/// `interval` and `timeout` are always positive; defaults are resolved by
/// whoever builds the job.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeJob {
    pub name: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub targets: Vec<Target>,
}

/// One address polled for metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// `host:port`, scraped at `http://<address>/metrics`.
    pub address: String,
    /// Static labels, applied on top of whatever the target reports.
    pub labels: Labels,
}

impl Target {
    pub fn new(address: impl Into<String>, labels: Labels) -> Self {
        Self {
            address: address.into(),
            labels,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/metrics", self.address)
    }
}
