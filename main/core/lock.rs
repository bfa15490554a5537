//! The process-wide network lock. Every public entry point of the stack
//! acquires it before touching protocol state; the guard releases it on
//! every exit path.

use std::sync::{Mutex, MutexGuard};

/// Failure to acquire the global lock; surfaces as a fault to the caller
/// rather than blocking forever on a stack that died mid-operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockError {
    /// A thread panicked while holding the lock.
    Poisoned,
}

#[derive(Debug)]
pub struct GlobalLock<T> {
    inner: Mutex<T>,
}

impl<T> GlobalLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the lock. The token names the entry point for diagnostics
    /// only; it plays no role in the locking itself.
    pub fn acquire(&self, token: &'static str) -> Result<MutexGuard<'_, T>, LockError> {
        match self.inner.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => {
                log::warn!("global network lock acquisition failed in {token}");
                Err(LockError::Poisoned)
            }
        }
    }
}
