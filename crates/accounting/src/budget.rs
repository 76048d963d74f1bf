//! Privacy budget ledger with optional caps.

use std::fmt;
use std::sync::Arc;

use diffpriv_core::{DpError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// An `(epsilon, delta)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Privacy loss.
    pub epsilon: f64,
    /// Failure probability.
    pub delta: f64,
}

impl Budget {
    /// Create a budget pair.
    pub const fn new(epsilon: f64, delta: f64) -> Self {
        Self { epsilon, delta }
    }

    /// The `(+inf, 1)` pair, i.e. no effective limit.
    pub const fn unbounded() -> Self {
        Self::new(f64::INFINITY, 1.0)
    }

    fn add(self, other: Self) -> Self {
        Self::new(self.epsilon + other.epsilon, self.delta + other.delta)
    }

    fn fits_within(self, cap: Self) -> bool {
        self.epsilon <= cap.epsilon && self.delta <= cap.delta
    }
}

impl From<(f64, f64)> for Budget {
    fn from((epsilon, delta): (f64, f64)) -> Self {
        Self::new(epsilon, delta)
    }
}

impl From<Budget> for (f64, f64) {
    fn from(budget: Budget) -> Self {
        (budget.epsilon, budget.delta)
    }
}

impl PartialEq<(f64, f64)> for Budget {
    fn eq(&self, other: &(f64, f64)) -> bool {
        self.epsilon == other.0 && self.delta == other.1
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(epsilon={}, delta={})", self.epsilon, self.delta)
    }
}

/// A spend must carry a non-negative epsilon (possibly infinite) and a delta
/// in `[0, 1]`.
fn check_spend(epsilon: f64, delta: f64) -> Result<()> {
    if epsilon.is_nan() || epsilon < 0.0 {
        return Err(DpError::invalid(format!(
            "spent epsilon must be non-negative, got {epsilon}"
        )));
    }
    if !(0.0..=1.0).contains(&delta) {
        return Err(DpError::invalid(format!(
            "spent delta must be in [0, 1], got {delta}"
        )));
    }
    Ok(())
}

fn check_cap(cap: Budget) -> Result<()> {
    if cap.epsilon.is_nan() || cap.epsilon < 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon cap must be non-negative, got {}",
            cap.epsilon
        )));
    }
    if !(0.0..=1.0).contains(&cap.delta) {
        return Err(DpError::invalid(format!(
            "delta cap must be in [0, 1], got {}",
            cap.delta
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<Budget>,
    spent: Budget,
}

impl Ledger {
    fn exceeded(&self, spend: Budget, cap: Budget) -> Option<DpError> {
        if self.spent.add(spend).fits_within(cap) {
            return None;
        }
        Some(DpError::BudgetExceeded {
            eps: spend.epsilon,
            delta: spend.delta,
            spent_eps: self.spent.epsilon,
            spent_delta: self.spent.delta,
            max_eps: cap.epsilon,
            max_delta: cap.delta,
        })
    }

    fn push(&mut self, spend: Budget) {
        self.spent = self.spent.add(spend);
        self.entries.push(spend);
    }
}

#[derive(Debug)]
struct Shared {
    cap: Budget,
    slack: f64,
    ledger: Mutex<Ledger>,
}

/// Append-only ledger of privacy spend under simple additive composition.
///
/// `BudgetAccountant` is a handle: clones share one ledger. Every
/// [`spend`](Self::spend) runs its check and append under a single lock, so
/// commits from concurrent holders serialize and a [`total`](Self::total)
/// read sees either the state before a spend or the state after it.
#[derive(Clone)]
pub struct BudgetAccountant {
    inner: Arc<Shared>,
}

impl BudgetAccountant {
    /// Create an empty ledger capped at `(epsilon_max, delta_max)`.
    pub fn new(epsilon_max: f64, delta_max: f64) -> Result<Self> {
        Self::with_spent_budget(epsilon_max, delta_max, std::iter::empty())
    }

    /// Create an empty ledger with no effective limit.
    pub fn unbounded() -> Self {
        Self::from_parts(Budget::unbounded(), 0.0, Ledger::default())
    }

    /// Create a ledger pre-loaded with previously committed spends.
    ///
    /// Fails if the prior spends alone already breach the caps.
    pub fn with_spent_budget(
        epsilon_max: f64,
        delta_max: f64,
        spent_budget: impl IntoIterator<Item = Budget>,
    ) -> Result<Self> {
        Self::with_slack(epsilon_max, delta_max, 0.0, spent_budget)
    }

    pub(crate) fn with_slack(
        epsilon_max: f64,
        delta_max: f64,
        slack: f64,
        spent_budget: impl IntoIterator<Item = Budget>,
    ) -> Result<Self> {
        let cap = Budget::new(epsilon_max, delta_max);
        check_cap(cap)?;
        check_slack(slack, cap.delta)?;

        let mut ledger = Ledger::default();
        for spend in spent_budget {
            check_spend(spend.epsilon, spend.delta)?;
            ledger.push(spend);
        }
        if !ledger.spent.fits_within(cap) {
            return Err(DpError::invalid(format!(
                "spent budget {} already exceeds the cap {}",
                ledger.spent, cap
            )));
        }

        Ok(Self::from_parts(cap, slack, ledger))
    }

    fn from_parts(cap: Budget, slack: f64, ledger: Ledger) -> Self {
        tracing::debug!(
            epsilon_max = cap.epsilon,
            delta_max = cap.delta,
            entries = ledger.entries.len(),
            "budget accountant created"
        );
        Self {
            inner: Arc::new(Shared {
                cap,
                slack,
                ledger: Mutex::new(ledger),
            }),
        }
    }

    /// Epsilon cap.
    pub fn epsilon_max(&self) -> f64 {
        self.inner.cap.epsilon
    }

    /// Delta cap.
    pub fn delta_max(&self) -> f64 {
        self.inner.cap.delta
    }

    /// Configured slack.
    pub fn slack(&self) -> f64 {
        self.inner.slack
    }

    /// Check whether `(epsilon, delta)` could be spent now, without spending it.
    pub fn check(&self, epsilon: f64, delta: f64) -> Result<()> {
        check_spend(epsilon, delta)?;
        let ledger = self.inner.ledger.lock();
        match ledger.exceeded(Budget::new(epsilon, delta), self.inner.cap) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Commit a spend of `(epsilon, delta)`.
    ///
    /// The running totals are compared to the caps with an exact `<=`, so a
    /// spend whose float sum lands a rounding step above the cap is refused
    /// (three spends of `0.1` overshoot a cap of `0.3`). On
    /// [`DpError::BudgetExceeded`] the ledger is left untouched.
    pub fn spend(&self, epsilon: f64, delta: f64) -> Result<()> {
        check_spend(epsilon, delta)?;
        let spend = Budget::new(epsilon, delta);

        let mut ledger = self.inner.ledger.lock();
        if let Some(err) = ledger.exceeded(spend, self.inner.cap) {
            tracing::warn!(
                epsilon,
                delta,
                spent_epsilon = ledger.spent.epsilon,
                spent_delta = ledger.spent.delta,
                "privacy spend rejected"
            );
            return Err(err);
        }
        ledger.push(spend);
        tracing::debug!(
            epsilon,
            delta,
            total_epsilon = ledger.spent.epsilon,
            total_delta = ledger.spent.delta,
            entry = ledger.entries.len(),
            "privacy spend committed"
        );
        Ok(())
    }

    /// Total spend under additive composition.
    pub fn total(&self) -> Budget {
        self.inner.ledger.lock().spent
    }

    /// Total spend, accepting a slack in `[0, delta_max]`.
    ///
    /// Composition is additive, so the slack does not change the result.
    pub fn total_with_slack(&self, slack: f64) -> Result<Budget> {
        check_slack(slack, self.inner.cap.delta)?;
        Ok(self.total())
    }

    /// Headroom left under the caps.
    pub fn remaining(&self) -> Budget {
        let spent = self.total();
        let cap = self.inner.cap;
        Budget::new(
            headroom(cap.epsilon, spent.epsilon),
            headroom(cap.delta, spent.delta),
        )
    }

    /// The largest budget that can be spent `k` more times.
    pub fn remaining_for(&self, k: usize) -> Result<Budget> {
        if k == 0 {
            return Err(DpError::invalid("number of queries must be positive"));
        }
        let left = self.remaining();
        let k = k as f64;
        Ok(Budget::new(left.epsilon / k, left.delta / k))
    }

    /// Snapshot of every committed spend, in commit order.
    pub fn spent_budget(&self) -> Vec<Budget> {
        self.inner.ledger.lock().entries.clone()
    }

    /// Number of committed spends.
    pub fn len(&self) -> usize {
        self.inner.ledger.lock().entries.len()
    }

    /// Whether nothing has been spent yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles refer to the same ledger.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn check_slack(slack: f64, delta_max: f64) -> Result<()> {
    if !(0.0..=delta_max).contains(&slack) {
        return Err(DpError::invalid(format!(
            "slack must be in [0, {delta_max}], got {slack}"
        )));
    }
    Ok(())
}

fn headroom(cap: f64, spent: f64) -> f64 {
    if cap == f64::INFINITY {
        return f64::INFINITY;
    }
    (cap - spent).max(0.0)
}

impl Default for BudgetAccountant {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for BudgetAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self.inner.ledger.lock();
        f.debug_struct("BudgetAccountant")
            .field("cap", &self.inner.cap)
            .field("slack", &self.inner.slack)
            .field("spent", &ledger.spent)
            .field("entries", &ledger.entries.len())
            .finish()
    }
}

impl fmt::Display for BudgetAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BudgetAccountant(epsilon={}, delta={}",
            self.inner.cap.epsilon, self.inner.cap.delta
        )?;
        if self.inner.slack > 0.0 {
            write!(f, ", slack={}", self.inner.slack)?;
        }
        let len = self.len();
        if len > 0 {
            write!(f, ", spent_budget=[{len} entries]")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffpriv_core::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn single_spend_is_totalled() {
        let acc = BudgetAccountant::unbounded();
        acc.spend(1.0, 0.0).expect("spend");
        assert_eq!(acc.total(), (1.0, 0.0));
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn rejected_spend_leaves_ledger_unchanged() {
        let acc = BudgetAccountant::new(1.5, 1.0).expect("valid caps");
        acc.spend(1.0, 0.0).expect("first spend fits");
        let err = acc.spend(1.0, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(acc.total(), (1.0, 0.0));
        assert_eq!(acc.spent_budget(), vec![Budget::new(1.0, 0.0)]);
    }

    #[test]
    fn cap_comparison_is_exact() {
        let acc = BudgetAccountant::new(0.3, 0.0).expect("valid caps");
        assert!(acc.spend(0.1, 0.0).is_ok());
        assert!(acc.spend(0.1, 0.0).is_ok());
        let err = acc.spend(0.1, 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BudgetExceeded);
        assert_eq!(acc.total(), (0.1 + 0.1, 0.0));

        let acc = BudgetAccountant::new(1.0, 0.0).expect("valid caps");
        let spent = (0..10).filter(|_| acc.spend(0.1, 0.0).is_ok()).count();
        assert_eq!(spent, 10);
        let left = acc.remaining().epsilon;
        assert!(left >= 0.0 && left < 1e-12, "{left}");
    }

    #[test]
    fn delta_cap_is_enforced() {
        let acc = BudgetAccountant::new(f64::INFINITY, 1e-5).expect("valid caps");
        acc.spend(1.0, 1e-5).expect("fits exactly");
        assert!(acc.spend(0.0, 1e-9).is_err());
        assert_eq!(acc.total(), (1.0, 1e-5));
    }

    #[test]
    fn check_does_not_spend() {
        let acc = BudgetAccountant::new(1.0, 0.0).expect("valid caps");
        acc.check(1.0, 0.0).expect("fits");
        assert!(acc.is_empty());
        assert!(acc.check(1.5, 0.0).is_err());
    }

    #[test]
    fn clones_share_the_ledger() {
        let acc = BudgetAccountant::unbounded();
        let other = acc.clone();
        other.spend(0.5, 0.0).expect("spend");
        assert_eq!(acc.total(), (0.5, 0.0));
        assert!(acc.ptr_eq(&other));
    }

    #[test]
    fn infinite_spend_on_unbounded_ledger() {
        let acc = BudgetAccountant::unbounded();
        acc.spend(f64::INFINITY, 0.0).expect("unbounded");
        acc.spend(1.0, 0.0).expect("still unbounded");
        assert_eq!(acc.total().epsilon, f64::INFINITY);
    }

    #[test]
    fn invalid_spends_are_value_errors() {
        let acc = BudgetAccountant::unbounded();
        assert_eq!(acc.spend(-1.0, 0.0).unwrap_err().kind(), ErrorKind::Value);
        assert_eq!(acc.spend(f64::NAN, 0.0).unwrap_err().kind(), ErrorKind::Value);
        assert_eq!(acc.spend(1.0, 1.5).unwrap_err().kind(), ErrorKind::Value);
        assert!(acc.is_empty());
    }

    #[test]
    fn invalid_caps_are_rejected() {
        assert!(BudgetAccountant::new(-1.0, 0.0).is_err());
        assert!(BudgetAccountant::new(1.0, 1.5).is_err());
        assert!(BudgetAccountant::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn prior_spends_are_loaded_and_capped() {
        let prior = vec![Budget::new(0.5, 0.0), Budget::new(0.25, 0.0)];
        let acc = BudgetAccountant::with_spent_budget(1.0, 0.0, prior.clone()).expect("fits");
        assert_eq!(acc.total(), (0.75, 0.0));
        assert_eq!(acc.spent_budget(), prior);

        let over = vec![Budget::new(0.75, 0.0), Budget::new(0.5, 0.0)];
        assert!(BudgetAccountant::with_spent_budget(1.0, 0.0, over).is_err());
    }

    #[test]
    fn remaining_splits_headroom() {
        let acc = BudgetAccountant::new(2.0, 1e-4).expect("valid caps");
        acc.spend(1.0, 0.0).expect("spend");
        assert_eq!(acc.remaining(), (1.0, 1e-4));
        let per_query = acc.remaining_for(4).expect("k > 0");
        assert_eq!(per_query, (0.25, 2.5e-5));
        assert!(acc.remaining_for(0).is_err());
        assert_eq!(
            BudgetAccountant::unbounded().remaining().epsilon,
            f64::INFINITY
        );
    }

    #[test]
    fn slack_is_validated_but_additive() {
        let acc = BudgetAccountant::new(1.0, 1e-3).expect("valid caps");
        acc.spend(0.5, 1e-4).expect("spend");
        assert_eq!(acc.total_with_slack(1e-4).expect("valid slack"), acc.total());
        assert!(acc.total_with_slack(1e-2).is_err());
        assert!(acc.total_with_slack(-1.0).is_err());
    }

    #[test]
    fn display_is_constructor_shaped() {
        let acc = BudgetAccountant::new(1.0, 0.0).expect("valid caps");
        assert_eq!(acc.to_string(), "BudgetAccountant(epsilon=1, delta=0)");
        acc.spend(0.5, 0.0).expect("spend");
        assert!(acc.to_string().contains("spent_budget=[1 entries]"));
    }

    #[test]
    fn concurrent_spends_never_exceed_cap() {
        let acc = BudgetAccountant::new(10.0, 1.0).expect("valid caps");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let acc = acc.clone();
                std::thread::spawn(move || (0..10).filter(|_| acc.spend(0.25, 0.0).is_ok()).count())
            })
            .collect();
        let committed: usize = handles.into_iter().map(|h| h.join().expect("join")).sum();
        assert_eq!(committed, 40);
        assert_eq!(acc.len(), 40);
        assert_eq!(acc.total(), (10.0, 0.0));
    }

    proptest! {
        #[test]
        fn total_is_monotone_and_capped(
            spends in proptest::collection::vec((0.0f64..2.0, 0.0f64..0.1), 1..40),
        ) {
            let acc = BudgetAccountant::new(10.0, 0.5).expect("valid caps");
            let mut previous = acc.total();
            for (eps, delta) in spends {
                let before = acc.total();
                match acc.spend(eps, delta) {
                    Ok(()) => prop_assert!(!acc.is_empty()),
                    Err(_) => prop_assert_eq!(acc.total(), before),
                }
                let now = acc.total();
                prop_assert!(now.epsilon >= previous.epsilon);
                prop_assert!(now.delta >= previous.delta);
                prop_assert!(now.epsilon <= 10.0 && now.delta <= 0.5);
                previous = now;
            }
        }
    }
}
