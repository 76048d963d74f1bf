//! Scoped default accountants.
//!
//! Mechanisms built without an explicit accountant pick up whichever
//! accountant is on top of an [`AccountantStack`] at construction time.
//! [`AccountantStack::enter`] pushes an accountant and returns a guard that
//! pops it again on drop, so scopes nest in last-entered, first-exited order.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::budget::BudgetAccountant;

/// A stack of default accountants.
#[derive(Debug, Default)]
pub struct AccountantStack {
    frames: Mutex<Vec<BudgetAccountant>>,
}

static GLOBAL: OnceLock<AccountantStack> = OnceLock::new();

impl AccountantStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide stack backing the implicit default.
    pub fn global() -> &'static AccountantStack {
        GLOBAL.get_or_init(AccountantStack::new)
    }

    /// Make `accountant` the default until the returned guard is dropped.
    #[must_use = "the accountant is deactivated as soon as the guard is dropped"]
    pub fn enter(&self, accountant: BudgetAccountant) -> AccountantScope<'_> {
        let mut frames = self.frames.lock();
        let depth = frames.len();
        frames.push(accountant.clone());
        tracing::trace!(depth = depth + 1, "accountant scope entered");
        AccountantScope {
            stack: self,
            depth,
            accountant,
        }
    }

    /// The accountant on top of the stack, if any.
    pub fn current(&self) -> Option<BudgetAccountant> {
        self.frames.lock().last().cloned()
    }

    /// Number of active scopes.
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }

    /// An explicit accountant wins; otherwise the current default, if any.
    pub fn resolve(&self, explicit: Option<BudgetAccountant>) -> Option<BudgetAccountant> {
        explicit.or_else(|| self.current())
    }
}

/// Guard returned by [`AccountantStack::enter`].
#[derive(Debug)]
pub struct AccountantScope<'a> {
    stack: &'a AccountantStack,
    depth: usize,
    accountant: BudgetAccountant,
}

impl AccountantScope<'_> {
    /// The accountant this scope activated.
    pub fn accountant(&self) -> &BudgetAccountant {
        &self.accountant
    }
}

impl Drop for AccountantScope<'_> {
    fn drop(&mut self) {
        let mut frames = self.stack.frames.lock();
        let on_top = frames.len() == self.depth + 1
            && frames
                .last()
                .is_some_and(|top| top.ptr_eq(&self.accountant));
        if !on_top {
            tracing::warn!(
                expected_depth = self.depth + 1,
                actual_depth = frames.len(),
                "accountant scope exited out of order"
            );
        }
        frames.truncate(self.depth);
        tracing::trace!(depth = self.depth, "accountant scope exited");
    }
}

impl BudgetAccountant {
    /// Make this accountant the process-wide default for the guard's lifetime.
    #[must_use = "the accountant is deactivated as soon as the guard is dropped"]
    pub fn activate(&self) -> AccountantScope<'static> {
        AccountantStack::global().enter(self.clone())
    }
}
