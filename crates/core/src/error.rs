//! Error types for differential privacy operations.

/// Broad class of a [`DpError`], for callers that branch on the kind of
/// failure rather than its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value of the wrong kind was supplied.
    Type,
    /// A value was of the right kind but outside its domain.
    Value,
    /// An operation was called in a way it does not accept.
    Usage,
    /// The mechanism does not define the requested analytic property.
    Unsupported,
    /// A spend would breach an accountant's cap.
    BudgetExceeded,
    /// A numerical computation produced a non-finite result.
    Numerical,
    /// A configuration could not be interpreted.
    Config,
}

/// Errors that can occur during DP operations.
#[derive(Debug, thiserror::Error)]
pub enum DpError {
    /// Committing the requested spend would exceed the accountant's cap.
    #[error(
        "privacy budget exceeded: spending (eps={eps:.4}, delta={delta:.2e}) on top of \
         (eps={spent_eps:.4}, delta={spent_delta:.2e}) breaches the cap \
         (eps={max_eps:.4}, delta={max_delta:.2e})"
    )]
    BudgetExceeded {
        /// Requested epsilon.
        eps: f64,
        /// Requested delta.
        delta: f64,
        /// Epsilon already spent.
        spent_eps: f64,
        /// Delta already spent.
        spent_delta: f64,
        /// Epsilon cap.
        max_eps: f64,
        /// Delta cap.
        max_delta: f64,
    },

    /// A value of the wrong kind was supplied.
    #[error("type mismatch: {msg}")]
    TypeMismatch {
        /// Human-readable error description.
        msg: String,
    },

    /// Invalid parameter provided.
    #[error("invalid parameter: {msg}")]
    InvalidParameters {
        /// Human-readable error description.
        msg: String,
    },

    /// An operation was invoked with arguments it does not accept.
    #[error("usage error: {msg}")]
    Usage {
        /// Human-readable error description.
        msg: String,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration error.
    #[error("configuration error: {msg}")]
    ConfigError {
        /// Human-readable error description.
        msg: String,
    },

    /// Unsupported feature or configuration.
    #[error("unsupported feature: {msg}")]
    UnsupportedFeature {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for DP operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid parameter error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters { msg: msg.into() }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::TypeMismatch { msg: msg.into() }
    }

    /// Create a usage error.
    pub fn usage<S: Into<String>>(msg: S) -> Self {
        Self::Usage { msg: msg.into() }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError { msg: msg.into() }
    }

    /// Create an unsupported feature error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFeature { msg: msg.into() }
    }

    /// The class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::TypeMismatch { .. } => ErrorKind::Type,
            Self::InvalidParameters { .. } => ErrorKind::Value,
            Self::Usage { .. } => ErrorKind::Usage,
            Self::NumericalError { .. } => ErrorKind::Numerical,
            Self::ConfigError { .. } => ErrorKind::Config,
            Self::UnsupportedFeature { .. } => ErrorKind::Unsupported,
        }
    }
}
