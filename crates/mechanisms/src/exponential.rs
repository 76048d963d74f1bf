//! The exponential mechanism.
//!
//! Selects one of `n` outcomes with probability proportional to
//! `measure_i * exp(epsilon * utility_i / (c * sensitivity))`, where `c` is 1
//! for monotonic utility functions and 2 otherwise. Probabilities are built
//! in the log domain and normalized with log-sum-exp, so large
//! `epsilon * utility / sensitivity` products neither overflow nor underflow
//! the whole distribution.

use diffpriv_accounting::{AccountantStack, BudgetAccountant};
use diffpriv_core::{
    constructor_repr, DeltaCheck, DpError, DpMechanism, MechanismParams, Result,
};
use diffpriv_prng::{check_random_state, RandomState, SharedRng};
use ndarray::{Array1, ArrayView1, Zip};
use rand_distr::{Distribution, Standard};

/// Delta is stored as given and must be zero by the time of a draw.
const DELTA_CHECK: DeltaCheck = DeltaCheck::Deferred;

/// Exponential mechanism over `n` outcomes labelled by `C`.
///
/// Without candidates the labels are the indices `0..n`.
#[derive(Debug)]
pub struct ExponentialMechanism<C = usize> {
    params: MechanismParams,
    utility: Array1<f64>,
    measure: Option<Array1<f64>>,
    labels: Vec<C>,
    labelled: bool,
    monotonic: bool,
    rng: SharedRng,
    accountant: Option<BudgetAccountant>,
}

/// Builder for [`ExponentialMechanism`].
#[derive(Debug)]
pub struct ExponentialBuilder<'a, C = usize> {
    epsilon: f64,
    delta: f64,
    sensitivity: f64,
    utility: Vec<f64>,
    measure: Option<Vec<f64>>,
    labels: Vec<C>,
    labelled: bool,
    monotonic: bool,
    random_state: RandomState,
    accountant: Option<BudgetAccountant>,
    stack: &'a AccountantStack,
}

impl ExponentialMechanism<usize> {
    /// Start building a mechanism over `utility`.
    pub fn builder(
        epsilon: f64,
        sensitivity: f64,
        utility: impl Into<Vec<f64>>,
    ) -> ExponentialBuilder<'static, usize> {
        let utility = utility.into();
        let labels = (0..utility.len()).collect();
        ExponentialBuilder {
            epsilon,
            delta: 0.0,
            sensitivity,
            utility,
            measure: None,
            labels,
            labelled: false,
            monotonic: false,
            random_state: RandomState::Entropy,
            accountant: None,
            stack: AccountantStack::global(),
        }
    }

    /// Build with default options.
    pub fn new(epsilon: f64, sensitivity: f64, utility: impl Into<Vec<f64>>) -> Result<Self> {
        Self::builder(epsilon, sensitivity, utility).build()
    }
}

impl<'a, C> ExponentialBuilder<'a, C> {
    /// Set delta. A nonzero value is accepted here and rejected by
    /// [`DpMechanism::randomize`].
    pub fn delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Background measure over outcomes.
    pub fn measure(mut self, measure: impl Into<Vec<f64>>) -> Self {
        self.measure = Some(measure.into());
        self
    }

    /// Whether the utility function is monotonic.
    pub fn monotonic(mut self, monotonic: bool) -> Self {
        self.monotonic = monotonic;
        self
    }

    /// Where randomness comes from.
    pub fn random_state(mut self, random_state: impl Into<RandomState>) -> Self {
        self.random_state = random_state.into();
        self
    }

    /// Charge every draw to `accountant`, ignoring any scoped default.
    pub fn accountant(mut self, accountant: BudgetAccountant) -> Self {
        self.accountant = Some(accountant);
        self
    }

    /// Resolve the default accountant from `stack` instead of the global one.
    pub fn accountant_stack<'b>(self, stack: &'b AccountantStack) -> ExponentialBuilder<'b, C> {
        ExponentialBuilder {
            epsilon: self.epsilon,
            delta: self.delta,
            sensitivity: self.sensitivity,
            utility: self.utility,
            measure: self.measure,
            labels: self.labels,
            labelled: self.labelled,
            monotonic: self.monotonic,
            random_state: self.random_state,
            accountant: self.accountant,
            stack,
        }
    }

    /// Label outcomes with `candidates` instead of their indices.
    pub fn candidates<D>(self, candidates: Vec<D>) -> ExponentialBuilder<'a, D> {
        self.relabel(candidates, true)
    }

    pub(crate) fn relabel<D>(self, labels: Vec<D>, labelled: bool) -> ExponentialBuilder<'a, D> {
        ExponentialBuilder {
            epsilon: self.epsilon,
            delta: self.delta,
            sensitivity: self.sensitivity,
            utility: self.utility,
            measure: self.measure,
            labels,
            labelled,
            monotonic: self.monotonic,
            random_state: self.random_state,
            accountant: self.accountant,
            stack: self.stack,
        }
    }

    /// Validate the inputs and build the mechanism.
    ///
    /// The default accountant is resolved here, so a mechanism built inside
    /// an accountant scope keeps charging that accountant after the scope ends.
    pub fn build(self) -> Result<ExponentialMechanism<C>> {
        let params = MechanismParams::new(self.epsilon, self.delta, self.sensitivity);
        params.validate(DELTA_CHECK)?;

        let n = self.utility.len();
        if n == 0 {
            return Err(DpError::invalid("utility must be non-empty"));
        }
        check_finite("utility", &self.utility)?;

        if let Some(measure) = &self.measure {
            if measure.len() != n {
                return Err(DpError::invalid(format!(
                    "measure has length {}, expected {n} to match utility",
                    measure.len()
                )));
            }
            check_finite("measure", measure)?;
            if measure.iter().any(|&m| m < 0.0) {
                return Err(DpError::invalid("measure entries must be non-negative"));
            }
            if measure.iter().all(|&m| m == 0.0) {
                return Err(DpError::invalid(
                    "measure must give at least one outcome positive weight",
                ));
            }
        }

        if self.labels.len() != n {
            return Err(DpError::invalid(format!(
                "candidates has length {}, expected {n} to match utility",
                self.labels.len()
            )));
        }

        let rng = check_random_state(self.random_state);
        let accountant = self.stack.resolve(self.accountant);

        tracing::debug!(
            outcomes = n,
            epsilon = self.epsilon,
            sensitivity = self.sensitivity,
            monotonic = self.monotonic,
            metered = accountant.is_some(),
            "exponential mechanism built"
        );

        Ok(ExponentialMechanism {
            params,
            utility: Array1::from(self.utility),
            measure: self.measure.map(Array1::from),
            labels: self.labels,
            labelled: self.labelled,
            monotonic: self.monotonic,
            rng,
            accountant,
        })
    }
}

fn check_finite(name: &str, values: &[f64]) -> Result<()> {
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(DpError::invalid(format!(
            "{name} must be finite, got {v} at index {i}"
        )));
    }
    Ok(())
}

/// The outcome distribution for one draw.
enum Selection {
    Fixed(usize),
    Weighted(Array1<f64>),
}

impl<C> ExponentialMechanism<C> {
    /// Epsilon.
    pub fn epsilon(&self) -> f64 {
        self.params.epsilon
    }

    /// Delta, as last set.
    pub fn delta(&self) -> f64 {
        self.params.delta
    }

    /// Replace delta. Checked on the next draw.
    pub fn set_delta(&mut self, delta: f64) {
        self.params.delta = delta;
    }

    /// Sensitivity of the utility function.
    pub fn sensitivity(&self) -> f64 {
        self.params.sensitivity
    }

    /// Utility scores.
    pub fn utility(&self) -> ArrayView1<'_, f64> {
        self.utility.view()
    }

    /// Background measure, if one was given.
    pub fn measure(&self) -> Option<ArrayView1<'_, f64>> {
        self.measure.as_ref().map(Array1::view)
    }

    /// Candidate labels, if any were given.
    pub fn candidates(&self) -> Option<&[C]> {
        self.labelled.then_some(self.labels.as_slice())
    }

    /// Whether the utility function is treated as monotonic.
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// Accountant charged by each draw.
    pub fn accountant(&self) -> Option<&BudgetAccountant> {
        self.accountant.as_ref()
    }

    /// Generator handle draws are taken from.
    pub fn random_source(&self) -> &SharedRng {
        &self.rng
    }

    fn eligible(&self, i: usize) -> bool {
        self.measure.as_ref().map_or(true, |m| m[i] > 0.0)
    }

    fn argmax(&self) -> usize {
        let mut best: Option<usize> = None;
        for (i, &u) in self.utility.iter().enumerate() {
            if !self.eligible(i) {
                continue;
            }
            if best.map_or(true, |b| u > self.utility[b]) {
                best = Some(i);
            }
        }
        // Validation guarantees at least one eligible outcome.
        best.unwrap_or(0)
    }

    /// Selection probability of every outcome.
    ///
    /// Outcomes with zero measure get exactly zero. In the deterministic
    /// regime (`epsilon = inf` or `sensitivity = 0`) all mass sits on the
    /// first maximizer of the utility.
    pub fn probabilities(&self) -> Result<Array1<f64>> {
        match self.selection()? {
            Selection::Fixed(index) => {
                let mut p = Array1::zeros(self.utility.len());
                p[index] = 1.0;
                Ok(p)
            }
            Selection::Weighted(p) => Ok(p),
        }
    }

    fn selection(&self) -> Result<Selection> {
        if self.params.is_deterministic() {
            return Ok(Selection::Fixed(self.argmax()));
        }

        let c = if self.monotonic { 1.0 } else { 2.0 };
        let scale = self.params.epsilon / (c * self.params.sensitivity);

        let ones;
        let measure = match &self.measure {
            Some(m) => m.view(),
            None => {
                ones = Array1::<f64>::ones(self.utility.len());
                ones.view()
            }
        };
        let scores = Zip::from(&self.utility)
            .and(&measure)
            .map_collect(|&u, &m| {
                if m > 0.0 {
                    m.ln() + scale * u
                } else {
                    f64::NEG_INFINITY
                }
            });

        let max = scores.fold(f64::NEG_INFINITY, |acc, &s| acc.max(s));
        if !max.is_finite() {
            return Err(DpError::numerical(format!(
                "exponential mechanism scores are not finite (max score {max})"
            )));
        }
        let log_norm = max + scores.fold(0.0, |acc, &s| acc + (s - max).exp()).ln();
        Ok(Selection::Weighted(scores.mapv(|s| (s - log_norm).exp())))
    }

    /// Draw one outcome index.
    ///
    /// The accountant, if any, is charged before any randomness is consumed,
    /// so a rejected spend leaves both the ledger and the stream untouched.
    pub fn sample_index(&self) -> Result<usize> {
        if self.params.delta != 0.0 {
            return Err(DpError::invalid(format!(
                "delta must be zero for the exponential mechanism, got {}",
                self.params.delta
            )));
        }

        let selection = self.selection()?;

        if let Some(accountant) = &self.accountant {
            accountant.spend(self.params.epsilon, self.params.delta)?;
        }

        let index = match selection {
            Selection::Fixed(index) => index,
            Selection::Weighted(p) => {
                let u: f64 = self.rng.with(|rng| Standard.sample(rng));
                inverse_cdf(p.view(), u)
            }
        };
        tracing::trace!(index, "exponential mechanism draw");
        Ok(index)
    }
}

/// Walk the CDF in index order, skipping zero-probability outcomes.
///
/// Rounding can leave the final cumulative sum just below `u`; the last
/// outcome with positive probability absorbs that residue.
fn inverse_cdf(probabilities: ArrayView1<'_, f64>, u: f64) -> usize {
    let mut cumulative = 0.0;
    let mut last = 0;
    for (i, &p) in probabilities.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        cumulative += p;
        last = i;
        if u < cumulative {
            return i;
        }
    }
    last
}

impl<C: Clone + std::fmt::Debug> DpMechanism for ExponentialMechanism<C> {
    type Output = C;

    fn name(&self) -> &'static str {
        "Exponential"
    }

    fn params(&self) -> &MechanismParams {
        &self.params
    }

    fn delta_check(&self) -> DeltaCheck {
        DELTA_CHECK
    }

    fn randomize(&self) -> Result<C> {
        let index = self.sample_index()?;
        Ok(self.labels[index].clone())
    }

    fn describe(&self) -> String {
        let mut fields = vec![
            ("epsilon", self.params.epsilon.to_string()),
            ("sensitivity", self.params.sensitivity.to_string()),
            ("utility", format!("{:?}", self.utility.to_vec())),
        ];
        if self.params.delta != 0.0 {
            fields.push(("delta", self.params.delta.to_string()));
        }
        if let Some(measure) = &self.measure {
            fields.push(("measure", format!("{:?}", measure.to_vec())));
        }
        if self.labelled {
            fields.push(("candidates", format!("{:?}", self.labels)));
        }
        if self.monotonic {
            fields.push(("monotonic", "true".to_string()));
        }
        constructor_repr(module_path!(), self.name(), &fields)
    }
}

impl<C: Clone + std::fmt::Debug> std::fmt::Display for ExponentialMechanism<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
