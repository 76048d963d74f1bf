//! Facade crate re-exporting stable APIs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use diffpriv_accounting as accounting;
pub use diffpriv_core as core;
pub use diffpriv_mechanisms as mechanisms;
pub use diffpriv_prng as prng;

pub use diffpriv_accounting::{
    AccountantConfig, AccountantScope, AccountantStack, Budget, BudgetAccountant,
    DpAccountantConfig,
};
pub use diffpriv_core::{DeltaCheck, DpError, DpMechanism, ErrorKind, MechanismParams, Result};
pub use diffpriv_mechanisms::{ExponentialBuilder, ExponentialConfig, ExponentialMechanism};
pub use diffpriv_prng::{check_random_state, RandomState, SharedRng};

/// Convenience prelude covering common DP building blocks.
pub mod prelude {
    pub use diffpriv_accounting::prelude::*;
    pub use diffpriv_core::prelude::*;
    pub use diffpriv_mechanisms::prelude::*;
    pub use diffpriv_prng::prelude::*;
}
