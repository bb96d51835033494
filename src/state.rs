use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A state enum that can be stored in an atomic cell
pub trait AtomicState: Copy + Send + Sync + 'static {
    fn to_u8(self) -> u8;
    fn from_u8(value: u8) -> Self;
}

/// Shared, lock-free state cell
///
/// Clones observe the same value. Background tasks read it and, where they
/// own a transition, apply it with `transition` so a concurrent writer can
/// never be overwritten.
pub struct SharedState<S: AtomicState> {
    inner: Arc<AtomicU8>,
    _state: PhantomData<S>,
}

impl<S: AtomicState> SharedState<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial.to_u8())),
            _state: PhantomData,
        }
    }

    pub fn get(&self) -> S {
        S::from_u8(self.inner.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: S) {
        self.inner.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Move `from -> to` only if the cell currently holds `from`
    pub fn transition(&self, from: S, to: S) -> bool {
        self.inner
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl<S: AtomicState> Clone for SharedState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _state: PhantomData,
        }
    }
}

impl<S: AtomicState + fmt::Debug> fmt::Debug for SharedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedState").field(&self.get()).finish()
    }
}
