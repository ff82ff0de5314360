//! Scoped reentrancy guard.
//!
//! [`ReentrancyLock::enter`] returns a guard that holds the lock until it is
//! dropped, so every exit path, error returns included, releases it.

use std::cell::Cell;
use std::rc::Rc;

use riskpool_types::{Result, RiskpoolError};

/// Mutex flag for sections that move funds before finishing their bookkeeping.
#[derive(Debug, Default)]
pub struct ReentrancyLock {
    held: Rc<Cell<bool>>,
}

impl ReentrancyLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock.
    ///
    /// # Errors
    /// [`RiskpoolError::Reentrancy`] if it is already held.
    pub fn enter(&self) -> Result<ReentrancyGuard> {
        if self.held.get() {
            tracing::warn!("reentrant call blocked");
            return Err(RiskpoolError::Reentrancy);
        }
        self.held.set(true);
        Ok(ReentrancyGuard {
            held: Rc::clone(&self.held),
        })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.get()
    }
}

/// A clone is a fresh, unlocked lock: snapshots never inherit a held flag
/// or share the cell with the original.
impl Clone for ReentrancyLock {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Releases its lock on drop.
#[derive(Debug)]
pub struct ReentrancyGuard {
    held: Rc<Cell<bool>>,
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        self.held.set(false);
    }
}
