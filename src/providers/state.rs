//! Lifecycle bookkeeping shared by the concrete providers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::types::ProviderHealth;
use crate::{ParlayError, Result};

/// Config, init/dispose flags and self-observed health of one provider.
pub(crate) struct ProviderState<C> {
    name: String,
    config: RwLock<C>,
    initialized: AtomicBool,
    disposed: AtomicBool,
    health: RwLock<ProviderHealth>,
}

impl<C: Clone> ProviderState<C> {
    pub(crate) fn new(name: impl Into<String>, config: C) -> Self {
        let name = name.into();
        Self {
            health: RwLock::new(ProviderHealth::new(name.clone())),
            name,
            config: RwLock::new(config),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> C {
        read(&self.config).clone()
    }

    /// Mutate the config; `invalidate` clears the initialized flag.
    pub(crate) fn update_config(&self, invalidate: bool, f: impl FnOnce(&mut C)) {
        f(&mut write(&self.config));
        if invalidate {
            self.initialized.store(false, Ordering::Release);
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns `true` if this call flipped the flag.
    pub(crate) fn mark_initialized(&self) -> bool {
        self.disposed.store(false, Ordering::Release);
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_disposed(&self) {
        self.initialized.store(false, Ordering::Release);
        self.disposed.store(true, Ordering::Release);
    }

    /// Fail domain calls on a disposed provider.
    pub(crate) fn ensure_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(ParlayError::Disposed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    pub(crate) fn health(&self) -> ProviderHealth {
        read(&self.health).clone()
    }

    pub(crate) fn record_probe(
        &self,
        healthy: bool,
        response_time: Option<Duration>,
        error: Option<String>,
    ) {
        write(&self.health).record_probe(healthy, response_time, error);
    }
}

// A poisoned lock only means a writer panicked mid-update; the plain-data
// contents are still usable.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
