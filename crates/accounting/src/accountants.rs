//! Accountant configuration types.

use diffpriv_core::{DpError, Result};
use serde::{Deserialize, Serialize};

use crate::budget::{Budget, BudgetAccountant};

/// Configuration for constructing a privacy accountant with a fresh state.
pub trait DpAccountantConfig {
    /// Accountant type created by this config.
    type Accountant;

    /// Create a new accountant instance.
    fn create_accountant(&self) -> Result<Self::Accountant>;
}

/// Configuration for a [`BudgetAccountant`].
///
/// JSON cannot carry infinities, so an absent `epsilon_max` means no
/// epsilon cap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccountantConfig {
    /// Epsilon cap; `None` for `+inf`.
    pub epsilon_max: Option<f64>,
    /// Delta cap; `None` for `1.0`.
    pub delta_max: Option<f64>,
    /// Slack reserved for tighter composition.
    pub slack: f64,
    /// Spends committed before this accountant was created.
    pub spent_budget: Vec<Budget>,
}

impl AccountantConfig {
    /// A config capped at `(epsilon_max, delta_max)`.
    pub fn new(epsilon_max: f64, delta_max: f64) -> Self {
        Self {
            epsilon_max: Some(epsilon_max),
            delta_max: Some(delta_max),
            ..Self::default()
        }
    }

    /// Set the slack.
    pub fn with_slack(mut self, slack: f64) -> Self {
        self.slack = slack;
        self
    }

    /// Pre-load prior spends.
    pub fn with_spent_budget(mut self, spent_budget: Vec<Budget>) -> Self {
        self.spent_budget = spent_budget;
        self
    }

    /// Epsilon cap with the default applied.
    pub fn effective_epsilon_max(&self) -> f64 {
        self.epsilon_max.unwrap_or(f64::INFINITY)
    }

    /// Delta cap with the default applied.
    pub fn effective_delta_max(&self) -> f64 {
        self.delta_max.unwrap_or(1.0)
    }

    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|err| DpError::config(format!("invalid accountant config: {err}")))
    }
}

impl DpAccountantConfig for AccountantConfig {
    type Accountant = BudgetAccountant;

    fn create_accountant(&self) -> Result<Self::Accountant> {
        BudgetAccountant::with_slack(
            self.effective_epsilon_max(),
            self.effective_delta_max(),
            self.slack,
            self.spent_budget.iter().copied(),
        )
    }
}
