use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{Client, StatusCode};

use crate::{
    codec,
    error::FetchError,
    job::Target,
    registry::MetricRegistry,
    value::{LABEL_INSTANCE, LABEL_JOB},
};

/// Largest response body accepted from a target by default.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Scrapes single targets into the shared registry.
#[derive(Debug, Clone)]
pub struct TargetFetcher {
    client: Client,
    registry: Arc<MetricRegistry>,
    body_limit: usize,
}

impl TargetFetcher {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self::with_client(Client::new(), registry)
    }

    pub fn with_client(client: Client, registry: Arc<MetricRegistry>) -> Self {
        Self {
            client,
            registry,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Rejects responses whose body exceeds `bytes`.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Fetches `target` once and registers everything it exposes, labelled
    /// with `job`, `instance` and then the target's static labels, which win
    /// over any label of the same name. Returns the number of metrics
    /// registered.
    pub async fn fetch(
        &self,
        job: &str,
        target: &Target,
        timeout: Duration,
    ) -> Result<usize, FetchError> {
        let mut response = self
            .client
            .get(target.url())
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status));
        }
        let limit = self.body_limit;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::BodyTooLarge(limit));
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }
        let metrics = codec::decode(&body[..])?;

        let count = metrics.len();
        for mut metric in metrics {
            metric.labels.insert(LABEL_JOB, job);
            metric.labels.insert(LABEL_INSTANCE, target.address.as_str());
            metric.labels.extend(&target.labels);
            self.registry.register(metric);
        }
        Ok(count)
    }

    /// Like [`fetch`](Self::fetch), but failures are only logged. A target
    /// that fails keeps its previously registered metrics.
    pub async fn scrape(&self, job: &str, target: &Target, timeout: Duration) {
        let start = Instant::now();
        match self.fetch(job, target, timeout).await {
            Ok(metrics) => tracing::debug!(
                job,
                target = %target.address,
                metrics,
                elapsed = ?start.elapsed(),
                "scrape succeeded"
            ),
            Err(error) => tracing::warn!(
                job,
                target = %target.address,
                %error,
                "scrape failed"
            ),
        }
    }
}
