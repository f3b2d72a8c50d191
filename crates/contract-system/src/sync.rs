//! Lock helpers that recover from poisoning.
//!
//! Every critical section in this crate leaves its data consistent between
//! statements, so a panic on another thread never leaves a half-written map.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Drop the oldest entries of a bounded history until at most `keep` remain
pub(crate) fn retain_newest<T>(history: &mut VecDeque<T>, keep: usize) {
    let excess = history.len().saturating_sub(keep);
    history.drain(..excess);
}
