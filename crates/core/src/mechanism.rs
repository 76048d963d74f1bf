//! The capability set shared by every randomized mechanism.

use std::fmt::Write as _;

use crate::error::{DpError, Result};

/// When a mechanism checks its `delta` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaCheck {
    /// `delta` must lie in `[0, 1)` at construction.
    Eager,
    /// `delta` is stored unchecked and validated by `randomize`.
    Deferred,
}

/// Privacy parameters common to all mechanisms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MechanismParams {
    /// Privacy loss bound. Positive, possibly infinite.
    pub epsilon: f64,
    /// Failure probability.
    pub delta: f64,
    /// Maximum change of the released quantity under one record.
    pub sensitivity: f64,
}

impl MechanismParams {
    /// Bundle parameters without validating them.
    pub fn new(epsilon: f64, delta: f64, sensitivity: f64) -> Self {
        Self {
            epsilon,
            delta,
            sensitivity,
        }
    }

    /// Validate epsilon, sensitivity and, for [`DeltaCheck::Eager`], delta.
    pub fn validate(&self, delta_check: DeltaCheck) -> Result<()> {
        check_epsilon(self.epsilon)?;
        if delta_check == DeltaCheck::Eager {
            check_delta(self.delta)?;
        }
        check_sensitivity(self.sensitivity)
    }

    /// Whether the mechanism degenerates to a deterministic release.
    pub fn is_deterministic(&self) -> bool {
        self.epsilon == f64::INFINITY || self.sensitivity == 0.0
    }
}

/// Epsilon must be positive; `+inf` is allowed.
pub fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_nan() {
        return Err(DpError::invalid("epsilon must be a number, got NaN"));
    }
    if epsilon <= 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be strictly positive, got {epsilon}"
        )));
    }
    Ok(())
}

/// Delta must lie in `[0, 1)`.
pub fn check_delta(delta: f64) -> Result<()> {
    if !(0.0..1.0).contains(&delta) {
        return Err(DpError::invalid(format!(
            "delta must be in [0, 1), got {delta}"
        )));
    }
    Ok(())
}

/// Sensitivity must be finite and non-negative.
pub fn check_sensitivity(sensitivity: f64) -> Result<()> {
    if !sensitivity.is_finite() || sensitivity < 0.0 {
        return Err(DpError::invalid(format!(
            "sensitivity must be finite and non-negative, got {sensitivity}"
        )));
    }
    Ok(())
}

/// A randomized mechanism.
///
/// Mechanisms in this family select an output rather than perturb one, so
/// [`DpMechanism::randomize`] takes no input. `bias` and `variance` default
/// to [`DpError::UnsupportedFeature`]; mechanisms that can compute them
/// analytically override the defaults.
pub trait DpMechanism {
    /// Value released by one draw.
    type Output;

    /// Type name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Privacy parameters of this instance.
    fn params(&self) -> &MechanismParams;

    /// When `delta` is validated.
    fn delta_check(&self) -> DeltaCheck {
        DeltaCheck::Eager
    }

    /// Validate the privacy parameters.
    fn validate_parameters(&self) -> Result<()> {
        self.params().validate(self.delta_check())
    }

    /// Draw one output.
    fn randomize(&self) -> Result<Self::Output>;

    /// Draw one output through the value-taking entry point.
    ///
    /// Fails with [`DpError::Usage`] when `value` is present.
    fn randomize_input(&self, value: Option<f64>) -> Result<Self::Output> {
        match value {
            Some(value) => Err(DpError::usage(format!(
                "{} does not take an input value, got {value}",
                self.name()
            ))),
            None => self.randomize(),
        }
    }

    /// Bias of the mechanism at `value`.
    fn bias(&self, _value: f64) -> Result<f64> {
        Err(DpError::unsupported(format!(
            "bias is not defined for {}",
            self.name()
        )))
    }

    /// Variance of the mechanism at `value`.
    fn variance(&self, _value: f64) -> Result<f64> {
        Err(DpError::unsupported(format!(
            "variance is not defined for {}",
            self.name()
        )))
    }

    /// Constructor-shaped description of the mechanism and its parameters.
    fn describe(&self) -> String;
}

/// Render `path::Name(key=value, ...)`.
pub fn constructor_repr(module_path: &str, name: &str, fields: &[(&str, String)]) -> String {
    let mut out = format!("{module_path}::{name}(");
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{key}={value}");
    }
    out.push(')');
    out
}
