use common_types::Sample;
use metrics::counter;
use tracing::warn;

use crate::config::TransformerSpec;
use crate::error::ConfigError;

pub mod rate_of_change;
pub mod unit_conversion;

pub use rate_of_change::RateOfChange;
pub use unit_conversion::UnitConversion;

/// One stage of a sink's transform chain.
///
/// A stage maps one sample to zero or more new samples; inputs are never
/// mutated. Stateful stages accumulate in `handle` and may emit what is left
/// from `flush` at the end of a publishing context.
pub trait Transformer: Send {
    fn handle(&mut self, sample: Sample) -> anyhow::Result<Vec<Sample>>;

    fn flush(&mut self) -> Vec<Sample> {
        Vec::new()
    }
}

/// Explicit name-to-factory table. Adding a transformer means adding an arm
/// here; nothing is discovered at runtime.
pub fn build_transformer(spec: &TransformerSpec) -> Result<Box<dyn Transformer>, ConfigError> {
    match spec.name.as_str() {
        "unit_conversion" => Ok(Box::new(UnitConversion::from_spec(spec)?)),
        "rate_of_change" => Ok(Box::new(RateOfChange::from_spec(spec)?)),
        other => Err(ConfigError::UnknownTransformer(other.to_string())),
    }
}

/// Ordered transform chain, applied in declaration order. A failing stage
/// drops the offending sample for this sink only; the rest of the batch and
/// the other sinks are unaffected.
pub struct TransformChain {
    stages: Vec<(String, Box<dyn Transformer>)>,
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field(
                "stages",
                &self.stages.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TransformChain {
    pub fn build(specs: &[TransformerSpec]) -> Result<TransformChain, ConfigError> {
        let stages = specs
            .iter()
            .map(|spec| Ok((spec.name.clone(), build_transformer(spec)?)))
            .collect::<Result<_, ConfigError>>()?;
        Ok(TransformChain { stages })
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&mut self, sample: Sample) -> Vec<Sample> {
        run_stages(&mut self.stages, vec![sample])
    }

    /// Drain stateful stages, routing what each emits through the stages
    /// after it.
    pub fn flush(&mut self) -> Vec<Sample> {
        let mut out = Vec::new();
        for i in 0..self.stages.len() {
            let (head, tail) = self.stages.split_at_mut(i + 1);
            let flushed = head[i].1.flush();
            if !flushed.is_empty() {
                out.extend(run_stages(tail, flushed));
            }
        }
        out
    }
}

fn run_stages(stages: &mut [(String, Box<dyn Transformer>)], samples: Vec<Sample>) -> Vec<Sample> {
    let mut current = samples;
    for (name, stage) in stages.iter_mut() {
        if current.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for sample in current {
            match stage.handle(sample) {
                Ok(produced) => next.extend(produced),
                Err(e) => {
                    warn!(transformer = %name, error = %e, "transformer failed, dropping sample");
                    counter!("pipeline_samples_dropped_total", "reason" => "transformer_error")
                        .increment(1);
                }
            }
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::SampleKind;
    use serde_json::json;

    fn spec(name: &str, parameters: serde_json::Value) -> TransformerSpec {
        TransformerSpec {
            name: name.to_string(),
            parameters,
        }
    }

    #[test]
    fn empty_chain_is_identity() {
        let mut chain = TransformChain::build(&[]).unwrap();
        let sample = Sample::new("cpu.util", SampleKind::Gauge, "%", 42.5, "node-1");
        let out = chain.apply(sample.clone());
        assert_eq!(out, vec![sample]);
    }

    #[test]
    fn identity_equivalent_conversion_preserves_volume() {
        let mut chain = TransformChain::build(&[spec(
            "unit_conversion",
            json!({"unit": "%", "scale": 1.0}),
        )])
        .unwrap();
        let sample = Sample::new("cpu.util", SampleKind::Gauge, "%", 42.5, "node-1");
        let out = chain.apply(sample.clone());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].volume_as_f64(), Some(42.5));
        assert_eq!(out[0].unit, "%");
    }

    #[test]
    fn unknown_transformer_is_a_config_error() {
        let err = TransformChain::build(&[spec("no_such_thing", json!(null))]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransformer(_)));
    }

    #[test]
    fn failing_stage_drops_only_the_offending_sample() {
        let mut chain = TransformChain::build(&[spec(
            "rate_of_change",
            json!(null),
        )])
        .unwrap();

        let mut bad = Sample::new("cpu.time", SampleKind::Cumulative, "ns", 0.0, "node-1");
        bad.volume = serde_json::Value::String("garbage".to_string());
        // The bad sample errors inside the stage and vanishes; nothing panics.
        assert!(chain.apply(bad).is_empty());

        // The chain keeps working for well-formed samples afterwards.
        let first = Sample::new("cpu.time", SampleKind::Cumulative, "ns", 100.0, "node-2");
        assert!(chain.apply(first).is_empty()); // primes state
    }
}
