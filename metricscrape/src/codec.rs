//! Text exposition format.
//!
//! ```text
//! # TYPE <metric_name> <counter|gauge>
//! <metric_name>{<k1>="<v1>",<k2>="<v2>"} <value>
//! <metric_name_no_labels> <value>
//! ```
//!
//! Decoding is lenient: lines that cannot be parsed, including lines that are
//! not valid UTF-8, are dropped and only a failing reader aborts the decode. Encoding is deterministic for a given
//! set of metrics, whatever order they are passed in.

use std::{fmt, io::BufRead};

use itertools::Itertools;

use crate::{
    error::CodecError,
    labels::Labels,
    value::{Metric, MetricType},
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const TYPE_DIRECTIVE: &str = "# TYPE ";

/// Decodes an exposition stream into metrics, without timestamps.
///
/// A `# TYPE` directive applies to every following metric line until the next
/// directive; lines before the first directive are gauges.
pub fn decode<R: BufRead>(reader: R) -> Result<Vec<Metric>, CodecError> {
    let mut metrics = Vec::new();
    let mut current_type = MetricType::Gauge;

    for line in reader.split(b'\n') {
        let line = line?;
        let Ok(line) = std::str::from_utf8(&line) else {
            tracing::trace!(bytes = line.len(), "dropping metric line that is not utf-8");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(TYPE_DIRECTIVE) {
            if let Some(token) = line.split_whitespace().nth(3) {
                current_type = MetricType::from_directive(token);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        match parse_line(line, current_type) {
            Some(metric) => metrics.push(metric),
            None => tracing::trace!(line, "dropping malformed metric line"),
        }
    }
    Ok(metrics)
}

pub fn decode_str(text: &str) -> Result<Vec<Metric>, CodecError> {
    decode(text.as_bytes())
}

/// Parses `NAME (LABELBLOCK)? VALUE`.
fn parse_line(line: &str, metric_type: MetricType) -> Option<Metric> {
    let (name, labels, value) = match line.split_once('{') {
        Some((name, rest)) => {
            let (block, value) = rest.split_once('}')?;
            (name.trim(), parse_labels(block), value.trim())
        }
        None => {
            let mut tokens = line.split_whitespace();
            let name = tokens.next()?;
            let value = tokens.next()?;
            (name, Labels::default(), value)
        }
    };
    if name.is_empty() {
        return None;
    }
    let value = value.parse::<f64>().ok()?;
    Some(Metric::new(name, metric_type, value).with_labels(labels))
}

fn parse_labels(block: &str) -> Labels {
    block
        .split(',')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name, value.trim().trim_matches('"')))
        })
        .collect()
}

/// Encodes metrics sorted by name, then labels, with one `# TYPE` line per
/// name taken from the first metric of that name.
pub fn encode(metrics: &[Metric]) -> String {
    Exposition(metrics).to_string()
}

/// Display adapter rendering a metric collection in exposition format.
pub struct Exposition<'a>(pub &'a [Metric]);

impl fmt::Display for Exposition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted = self.0.iter().sorted_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.labels.cmp(&b.labels))
                .then_with(|| a.value.total_cmp(&b.value))
        });

        let mut previous: Option<&str> = None;
        for metric in sorted {
            if previous != Some(metric.name.as_str()) {
                writeln!(f, "{TYPE_DIRECTIVE}{} {}", metric.name, metric.metric_type)?;
                previous = Some(metric.name.as_str());
            }
            f.write_str(&metric.name)?;
            if !metric.labels.is_empty() {
                let pairs = metric
                    .labels
                    .iter()
                    .format_with(",", |l, f| f(&format_args!("{}=\"{}\"", l.name, l.value)));
                write!(f, "{{{pairs}}}")?;
            }
            writeln!(f, " {}", SampleValue(metric.value))?;
        }
        Ok(())
    }
}

struct SampleValue(f64);

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            v if v.is_nan() => f.write_str("NaN"),
            v if v == f64::INFINITY => f.write_str("+Inf"),
            v if v == f64::NEG_INFINITY => f.write_str("-Inf"),
            v => write!(f, "{v}"),
        }
    }
}
