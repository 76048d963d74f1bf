//! Core differential privacy contracts.
//!
//! This crate holds the error taxonomy shared by every diffpriv crate and
//! the [`DpMechanism`] contract that randomized mechanisms implement.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mechanism;

pub use error::{DpError, ErrorKind, Result};
pub use mechanism::{
    check_delta, check_epsilon, check_sensitivity, constructor_repr, DeltaCheck, DpMechanism,
    MechanismParams,
};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{DeltaCheck, DpError, DpMechanism, ErrorKind, MechanismParams, Result};
}
