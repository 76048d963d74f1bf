//! Privacy budget accounting for randomized mechanisms.
//!
//! A [`BudgetAccountant`] records every `(epsilon, delta)` spend in an
//! append-only ledger, composes them additively and rejects any spend that
//! would push the totals past its caps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accountants;
pub mod budget;
pub mod scope;

pub use accountants::{AccountantConfig, DpAccountantConfig};
pub use budget::{Budget, BudgetAccountant};
pub use scope::{AccountantScope, AccountantStack};

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        AccountantConfig, AccountantScope, AccountantStack, Budget, BudgetAccountant,
        DpAccountantConfig,
    };
}
