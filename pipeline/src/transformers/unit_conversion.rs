use anyhow::anyhow;
use common_types::Sample;
use serde::Deserialize;
use serde_json::Value;

use crate::config::TransformerSpec;
use crate::error::ConfigError;
use crate::transformers::Transformer;

#[derive(Debug, Deserialize)]
struct Params {
    /// Meter name for the converted sample; unchanged when omitted.
    name: Option<String>,
    unit: String,
    scale: f64,
    #[serde(default)]
    offset: f64,
}

/// Stateless linear rescaling: `volume * scale + offset`, with a new unit
/// and optionally a new meter name.
pub struct UnitConversion {
    params: Params,
}

impl UnitConversion {
    pub fn from_spec(spec: &TransformerSpec) -> Result<UnitConversion, ConfigError> {
        let params: Params = serde_json::from_value(spec.parameters.clone()).map_err(|e| {
            ConfigError::TransformerParameters {
                name: spec.name.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(UnitConversion { params })
    }
}

impl Transformer for UnitConversion {
    fn handle(&mut self, sample: Sample) -> anyhow::Result<Vec<Sample>> {
        let volume = sample
            .volume_as_f64()
            .ok_or_else(|| anyhow!("non-numeric volume {:?}", sample.volume))?;
        let converted = volume * self.params.scale + self.params.offset;
        Ok(vec![Sample {
            name: self.params.name.clone().unwrap_or_else(|| sample.name.clone()),
            unit: self.params.unit.clone(),
            volume: Value::from(converted),
            ..sample
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::SampleKind;
    use serde_json::json;

    fn conversion(parameters: serde_json::Value) -> UnitConversion {
        UnitConversion::from_spec(&TransformerSpec {
            name: "unit_conversion".to_string(),
            parameters,
        })
        .expect("valid parameters")
    }

    #[test]
    fn rescales_and_renames() {
        let mut t = conversion(json!({
            "name": "memory.usage.mb",
            "unit": "MB",
            "scale": 0.000001,
        }));
        let sample = Sample::new("memory.usage", SampleKind::Gauge, "B", 52_428_800.0, "node-1");
        let out = t.handle(sample).unwrap();
        assert_eq!(out[0].name, "memory.usage.mb");
        assert_eq!(out[0].unit, "MB");
        assert!((out[0].volume_as_f64().unwrap() - 52.4288).abs() < 1e-9);
    }

    #[test]
    fn offset_applies_after_scale() {
        let mut t = conversion(json!({"unit": "F", "scale": 1.8, "offset": 32.0}));
        let sample = Sample::new("ambient.temp", SampleKind::Gauge, "C", 100.0, "node-1");
        let out = t.handle(sample).unwrap();
        assert_eq!(out[0].volume_as_f64(), Some(212.0));
    }

    #[test]
    fn missing_required_parameters_fail_at_load() {
        let result = UnitConversion::from_spec(&TransformerSpec {
            name: "unit_conversion".to_string(),
            parameters: json!({"scale": 2.0}),
        });
        assert!(matches!(
            result,
            Err(ConfigError::TransformerParameters { .. })
        ));
    }

    #[test]
    fn non_numeric_volume_is_an_error() {
        let mut t = conversion(json!({"unit": "x", "scale": 1.0}));
        let mut sample = Sample::new("m", SampleKind::Gauge, "u", 1.0, "r");
        sample.volume = Value::Null;
        assert!(t.handle(sample).is_err());
    }
}
