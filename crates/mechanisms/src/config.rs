//! Exponential mechanism configuration from serialized input.
//!
//! [`ExponentialConfig`] deserializes strictly through serde. Callers that
//! hold untyped JSON (for example parameters forwarded from an estimator's
//! own config file) use [`ExponentialConfig::from_value`], which reports a
//! [`DpError::TypeMismatch`] for a value of the wrong kind and a
//! [`DpError::InvalidParameters`] for a value out of its domain.

use diffpriv_accounting::BudgetAccountant;
use diffpriv_core::{DpError, Result};
use diffpriv_prng::RandomState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::exponential::{ExponentialBuilder, ExponentialMechanism};

const KEYS: &[&str] = &[
    "epsilon",
    "delta",
    "sensitivity",
    "utility",
    "measure",
    "candidates",
    "monotonic",
    "random_state",
];

/// Serializable parameters of an exponential mechanism.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExponentialConfig {
    /// Privacy loss bound.
    pub epsilon: f64,
    /// Must be zero by the time the mechanism draws.
    #[serde(default)]
    pub delta: f64,
    /// Sensitivity of the utility function.
    pub sensitivity: f64,
    /// Utility score per outcome.
    pub utility: Vec<f64>,
    /// Optional background measure.
    #[serde(default)]
    pub measure: Option<Vec<f64>>,
    /// Optional outcome labels.
    #[serde(default)]
    pub candidates: Option<Vec<Value>>,
    /// Whether the utility function is monotonic.
    #[serde(default)]
    pub monotonic: bool,
    /// Seed for a mechanism-owned generator; entropy when absent.
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl ExponentialConfig {
    /// Parse a config from JSON text with strict typing.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| DpError::config(format!("invalid exponential config: {err}")))
    }

    /// Interpret an untyped JSON object.
    ///
    /// `monotonic` accepts any value and keeps only its truthiness.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            DpError::type_mismatch(format!(
                "exponential config must be an object, got {}",
                kind(value)
            ))
        })?;
        if let Some(key) = obj.keys().find(|k| !KEYS.contains(&k.as_str())) {
            return Err(DpError::config(format!("unknown key `{key}`")));
        }

        Ok(Self {
            epsilon: real(required(obj, "epsilon")?, "epsilon")?,
            delta: optional(obj, "delta")
                .map(|v| real(v, "delta"))
                .transpose()?
                .unwrap_or(0.0),
            sensitivity: real(required(obj, "sensitivity")?, "sensitivity")?,
            utility: reals(required(obj, "utility")?, "utility")?,
            measure: optional(obj, "measure")
                .map(|v| reals(v, "measure"))
                .transpose()?,
            candidates: optional(obj, "candidates")
                .map(|v| sequence(v, "candidates").map(<[Value]>::to_vec))
                .transpose()?,
            monotonic: obj.get("monotonic").map_or(false, truthy),
            random_state: optional(obj, "random_state")
                .map(seed)
                .transpose()?,
        })
    }

    /// A builder preloaded with this config.
    ///
    /// Outcomes are labelled by `candidates` when present and by their index
    /// as a JSON number otherwise.
    pub fn builder(&self) -> ExponentialBuilder<'static, Value> {
        let base =
            ExponentialMechanism::builder(self.epsilon, self.sensitivity, self.utility.clone())
                .delta(self.delta)
                .monotonic(self.monotonic)
                .random_state(RandomState::from(self.random_state));
        let base = match &self.measure {
            Some(measure) => base.measure(measure.clone()),
            None => base,
        };
        match &self.candidates {
            Some(candidates) => base.candidates(candidates.clone()),
            None => {
                let labels = (0..self.utility.len()).map(Value::from).collect();
                base.relabel(labels, false)
            }
        }
    }

    /// Build the mechanism, charging `accountant` when given.
    pub fn build(
        &self,
        accountant: Option<BudgetAccountant>,
    ) -> Result<ExponentialMechanism<Value>> {
        match accountant {
            Some(accountant) => self.builder().accountant(accountant).build(),
            None => self.builder().build(),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required<'v>(obj: &'v Map<String, Value>, key: &str) -> Result<&'v Value> {
    obj.get(key)
        .ok_or_else(|| DpError::config(format!("missing required key `{key}`")))
}

fn optional<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn real(value: &Value, name: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        DpError::type_mismatch(format!("{name} must be a real number, got {}", kind(value)))
    })
}

fn sequence<'v>(value: &'v Value, name: &str) -> Result<&'v [Value]> {
    value.as_array().map(Vec::as_slice).ok_or_else(|| {
        DpError::type_mismatch(format!("{name} must be a sequence, got {}", kind(value)))
    })
}

fn reals(value: &Value, name: &str) -> Result<Vec<f64>> {
    sequence(value, name)?
        .iter()
        .enumerate()
        .map(|(i, v)| real(v, &format!("{name}[{i}]")))
        .collect()
}

fn seed(value: &Value) -> Result<u64> {
    value.as_u64().ok_or_else(|| {
        DpError::type_mismatch(format!(
            "random_state must be a non-negative integer seed, got {}",
            kind(value)
        ))
    })
}

/// Truthiness of an arbitrary JSON value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
