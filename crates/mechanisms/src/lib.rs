//! Differentially private selection mechanisms.
//!
//! The [`ExponentialMechanism`] picks one of a finite set of outcomes, favouring
//! high-utility outcomes while keeping an `epsilon`-DP guarantee. Each draw
//! is charged to a [`BudgetAccountant`](diffpriv_accounting::BudgetAccountant)
//! when one is bound, either explicitly or through an accountant scope.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod exponential;

pub use config::{truthy, ExponentialConfig};
pub use exponential::{ExponentialBuilder, ExponentialMechanism};

/// Common imports for mechanisms.
pub mod prelude {
    pub use crate::{ExponentialBuilder, ExponentialConfig, ExponentialMechanism};
}
