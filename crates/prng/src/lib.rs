//! Random sources for randomized mechanisms.
//!
//! A mechanism never owns a bare generator. It holds a [`SharedRng`] handle,
//! obtained by normalizing a caller-provided [`RandomState`] through
//! [`check_random_state`]:
//!
//! * [`RandomState::Entropy`] produces a fresh generator seeded from the OS.
//! * [`RandomState::Seed`] produces a new generator owned by the mechanism,
//!   so two mechanisms built from the same seed replay the same stream.
//! * [`RandomState::Shared`] hands back the caller's handle unchanged. Every
//!   holder draws from the same stream, in whatever order they are called.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

type DynRng = Box<dyn RngCore + Send>;

/// A cloneable, thread-safe handle to a random generator.
///
/// Clones share the underlying stream. Draws are serialized by an internal
/// lock, so concurrent holders interleave but never observe a torn state.
#[derive(Clone)]
pub struct SharedRng {
    inner: Arc<Mutex<DynRng>>,
}

impl SharedRng {
    /// Wrap an arbitrary generator in a shared handle.
    pub fn from_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(rng))),
        }
    }

    /// A ChaCha20 generator deterministically seeded by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    /// A ChaCha20 generator seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::from_rng(ChaCha20Rng::from_entropy())
    }

    /// Run `f` with exclusive access to the generator.
    ///
    /// The lock is held for the duration of `f`, so a multi-draw sample is
    /// taken from one contiguous slice of the stream.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut guard = self.inner.lock();
        f(&mut **guard)
    }

    /// Whether two handles refer to the same generator.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRng")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl RngCore for SharedRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.lock().next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.lock().next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.lock().fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.lock().try_fill_bytes(dest)
    }
}

/// Caller-facing description of where a mechanism draws randomness from.
#[derive(Clone, Debug, Default)]
pub enum RandomState {
    /// A fresh generator seeded from operating-system entropy.
    #[default]
    Entropy,
    /// A new generator deterministically seeded by the given value.
    Seed(u64),
    /// An existing handle, shared with the caller.
    Shared(SharedRng),
}

impl From<u64> for RandomState {
    fn from(seed: u64) -> Self {
        Self::Seed(seed)
    }
}

impl From<Option<u64>> for RandomState {
    fn from(seed: Option<u64>) -> Self {
        seed.map_or(Self::Entropy, Self::Seed)
    }
}

impl From<SharedRng> for RandomState {
    fn from(rng: SharedRng) -> Self {
        Self::Shared(rng)
    }
}

impl From<&SharedRng> for RandomState {
    fn from(rng: &SharedRng) -> Self {
        Self::Shared(rng.clone())
    }
}

/// Normalize a [`RandomState`] into a generator handle.
///
/// A shared handle is returned as-is and is never reseeded.
pub fn check_random_state(state: impl Into<RandomState>) -> SharedRng {
    match state.into() {
        RandomState::Entropy => SharedRng::from_entropy(),
        RandomState::Seed(seed) => SharedRng::seeded(seed),
        RandomState::Shared(rng) => rng,
    }
}

/// Common imports for random sources.
pub mod prelude {
    pub use crate::{check_random_state, RandomState, SharedRng};
}
