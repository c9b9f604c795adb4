use std::collections::HashMap;
use std::str::FromStr;

use url::Url;

use crate::error::PublishError;

pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 1024;

/// Behavior on delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Send once, propagate the failure to the caller.
    Default,
    /// Send once, discard the batch on failure.
    Drop,
    /// Buffer failed batches in a bounded local queue and flush them ahead
    /// of later batches.
    Queue,
}

impl FromStr for DeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "default" => Ok(DeliveryPolicy::Default),
            "drop" => Ok(DeliveryPolicy::Drop),
            "queue" => Ok(DeliveryPolicy::Queue),
            _ => Err(format!("unknown delivery policy: {s}")),
        }
    }
}

/// A parsed publisher target.
///
/// `scheme://[user:pass@]host[:port][/path]?policy=...&max_queue_length=N
/// &max_retry=N&per_meter_topic=bool&<backend keys>`
///
/// The destination is the URI path (leading slash stripped); an empty path
/// falls back to a `topic` query option, then to "samples". `max_retry=0`
/// means unbounded tolerance: the queue policy re-queues forever and never
/// escalates to fail-fast.
#[derive(Debug, Clone)]
pub struct PublisherSpec {
    pub scheme: String,
    pub destination: String,
    pub policy: DeliveryPolicy,
    pub max_queue_length: usize,
    pub max_retry: usize,
    pub per_meter_topic: bool,
    /// Backend-specific query options, policy keys removed.
    pub options: HashMap<String, String>,
    pub url: Url,
}

impl PublisherSpec {
    pub fn parse(uri: &str) -> Result<PublisherSpec, PublishError> {
        let url = Url::parse(uri).map_err(|e| PublishError::invalid_target(uri, e))?;

        let mut options: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let policy = match options.remove("policy") {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| PublishError::invalid_target(uri, e))?,
            None => DeliveryPolicy::Default,
        };
        let max_queue_length = parse_count(uri, &mut options, "max_queue_length")?
            .unwrap_or(DEFAULT_MAX_QUEUE_LENGTH);
        if max_queue_length == 0 {
            return Err(PublishError::invalid_target(
                uri,
                "max_queue_length must be positive",
            ));
        }
        let max_retry = parse_count(uri, &mut options, "max_retry")?.unwrap_or(0);
        let per_meter_topic = match options.remove("per_meter_topic") {
            Some(raw) => raw
                .parse()
                .map_err(|_| PublishError::invalid_target(uri, "per_meter_topic must be a bool"))?,
            None => false,
        };

        let destination = {
            let path = url.path().trim_matches('/');
            if !path.is_empty() {
                path.to_string()
            } else if let Some(topic) = options.get("topic") {
                topic.clone()
            } else {
                "samples".to_string()
            }
        };

        Ok(PublisherSpec {
            scheme: url.scheme().to_string(),
            destination,
            policy,
            max_queue_length,
            max_retry,
            per_meter_topic,
            options,
            url,
        })
    }

    /// Bootstrap address for network backends, e.g. "broker:9092".
    pub fn host_port(&self) -> Option<String> {
        let host = self.url.host_str()?;
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

fn parse_count(
    uri: &str,
    options: &mut HashMap<String, String>,
    key: &str,
) -> Result<Option<usize>, PublishError> {
    options
        .remove(key)
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| PublishError::invalid_target(uri, format!("{key} must be an integer")))
        })
        .transpose()
}
