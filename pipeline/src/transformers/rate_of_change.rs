use std::collections::HashMap;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use common_types::{Sample, SampleKind};
use serde::Deserialize;
use serde_json::Value;

use crate::config::TransformerSpec;
use crate::error::ConfigError;
use crate::transformers::Transformer;

#[derive(Debug, Default, Deserialize)]
struct Params {
    /// Meter name for the derived rate; defaults to `<name>.rate`.
    name: Option<String>,
}

/// Derives a per-second rate from a cumulative or gauge meter.
///
/// Stateful: remembers the previous (timestamp, volume) per resource. The
/// first observation of a resource only primes the state, and a volume lower
/// than the previous one is treated as a counter reset and re-primes rather
/// than emitting a negative rate.
pub struct RateOfChange {
    params: Params,
    previous: HashMap<String, (DateTime<Utc>, f64)>,
}

impl RateOfChange {
    pub fn from_spec(spec: &TransformerSpec) -> Result<RateOfChange, ConfigError> {
        let params: Params = if spec.parameters.is_null() {
            Params::default()
        } else {
            serde_json::from_value(spec.parameters.clone()).map_err(|e| {
                ConfigError::TransformerParameters {
                    name: spec.name.clone(),
                    reason: e.to_string(),
                }
            })?
        };
        Ok(RateOfChange {
            params,
            previous: HashMap::new(),
        })
    }
}

impl Transformer for RateOfChange {
    fn handle(&mut self, sample: Sample) -> anyhow::Result<Vec<Sample>> {
        let volume = sample
            .volume_as_f64()
            .ok_or_else(|| anyhow!("non-numeric volume {:?}", sample.volume))?;

        let prior = self
            .previous
            .insert(sample.resource_id.clone(), (sample.timestamp, volume));
        let Some((prior_ts, prior_volume)) = prior else {
            return Ok(Vec::new());
        };

        let elapsed = (sample.timestamp - prior_ts).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 || volume < prior_volume {
            // Out-of-order sample or counter reset; state is re-primed.
            return Ok(Vec::new());
        }

        let rate = (volume - prior_volume) / elapsed;
        Ok(vec![Sample {
            name: self
                .params
                .name
                .clone()
                .unwrap_or_else(|| format!("{}.rate", sample.name)),
            kind: SampleKind::Gauge,
            unit: format!("{}/s", sample.unit),
            volume: Value::from(rate),
            ..sample
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rate_of_change() -> RateOfChange {
        RateOfChange::from_spec(&TransformerSpec {
            name: "rate_of_change".to_string(),
            parameters: Value::Null,
        })
        .expect("null parameters are valid")
    }

    fn sample_at(volume: f64, offset_secs: i64) -> Sample {
        let mut sample = Sample::new("cpu.time", SampleKind::Cumulative, "ns", volume, "node-1");
        sample.timestamp = DateTime::<Utc>::MIN_UTC + Duration::seconds(offset_secs + 1_000_000);
        sample
    }

    #[test]
    fn first_observation_primes_without_emitting() {
        let mut t = rate_of_change();
        assert!(t.handle(sample_at(100.0, 0)).unwrap().is_empty());
    }

    #[test]
    fn emits_per_second_rate() {
        let mut t = rate_of_change();
        t.handle(sample_at(100.0, 0)).unwrap();
        let out = t.handle(sample_at(160.0, 10)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "cpu.time.rate");
        assert_eq!(out[0].kind, SampleKind::Gauge);
        assert_eq!(out[0].unit, "ns/s");
        assert_eq!(out[0].volume_as_f64(), Some(6.0));
    }

    #[test]
    fn counter_reset_reprimes() {
        let mut t = rate_of_change();
        t.handle(sample_at(100.0, 0)).unwrap();
        assert!(t.handle(sample_at(5.0, 10)).unwrap().is_empty());
        // Rate resumes from the reset baseline.
        let out = t.handle(sample_at(25.0, 20)).unwrap();
        assert_eq!(out[0].volume_as_f64(), Some(2.0));
    }

    #[test]
    fn resources_are_tracked_independently() {
        let mut t = rate_of_change();
        let mut other = sample_at(50.0, 0);
        other.resource_id = "node-2".to_string();

        t.handle(sample_at(100.0, 0)).unwrap();
        assert!(t.handle(other).unwrap().is_empty());

        let out = t.handle(sample_at(110.0, 10)).unwrap();
        assert_eq!(out[0].volume_as_f64(), Some(1.0));
    }
}
