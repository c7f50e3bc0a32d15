pub mod codec;
mod error;
mod fetcher;
mod job;
mod labels;
mod registry;
mod scheduler;
pub mod value;

pub use {
    error::{CodecError, FetchError},
    fetcher::{TargetFetcher, DEFAULT_BODY_LIMIT},
    job::{ScrapeJob, Target},
    labels::{canonical_key, Label, Labels},
    registry::MetricRegistry,
    scheduler::ScrapeScheduler,
    value::{Metric, MetricType},
};
