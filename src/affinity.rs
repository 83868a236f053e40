//! Owner-thread identity and state that may only be touched on that thread.

use std::cell::{Ref, RefCell};
use std::mem::ManuallyDrop;
use std::thread::{self, ThreadId};

use crate::error::{BindingError, Result};

/// Value pinned to the thread that created it.
///
/// The wrapper may be shared with or moved to other threads, but the value is
/// only reachable from the owner thread. The owner can [`take`](Self::take)
/// the value out to destroy it in place. If the wrapper is dropped elsewhere
/// while still holding the value, the value is leaked instead of being
/// destroyed off-thread.
pub struct OwnerBound<T> {
    owner: ThreadId,
    value: ManuallyDrop<RefCell<Option<T>>>,
}

// SAFETY: the inner cell is only ever borrowed by `get` and `take`, which refuse
// every thread except `owner`. `Drop` has exclusive access and never runs the
// value's destructor on another thread.
unsafe impl<T> Send for OwnerBound<T> {}
// SAFETY: see above; shared access from other threads cannot reach `value`.
unsafe impl<T> Sync for OwnerBound<T> {}

impl<T> OwnerBound<T> {
    /// Bind `value` to the current thread.
    pub fn new(value: T) -> Self {
        Self {
            owner: thread::current().id(),
            value: ManuallyDrop::new(RefCell::new(Some(value))),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Borrow the value. Shared borrows nest, so reentrant owner-thread code
    /// may call this again while an outer borrow is live.
    pub fn get(&self) -> Result<Ref<'_, T>> {
        if !self.is_owner() {
            return Err(BindingError::NotOwnerThread);
        }
        let cell = self.value.try_borrow().map_err(|_| BindingError::InUse)?;
        Ref::filter_map(cell, Option::as_ref).map_err(|_| BindingError::Disposed)
    }

    /// Move the value out on the owner thread. `None` once already taken.
    pub fn take(&self) -> Result<Option<T>> {
        if !self.is_owner() {
            return Err(BindingError::NotOwnerThread);
        }
        let mut cell = self.value.try_borrow_mut().map_err(|_| BindingError::InUse)?;
        Ok(cell.take())
    }
}

impl<T> Drop for OwnerBound<T> {
    fn drop(&mut self) {
        if self.is_owner() || self.value.get_mut().is_none() {
            // SAFETY: `value` is never used again after this point, and it
            // holds nothing that belongs to another thread.
            unsafe { ManuallyDrop::drop(&mut self.value) };
        } else {
            log::warn!(
                "Owner-bound {} dropped on {:?} (owner {:?}), leaking it",
                std::any::type_name::<T>(),
                thread::current().id(),
                self.owner
            );
        }
    }
}

impl<T> std::fmt::Debug for OwnerBound<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerBound").field("owner", &self.owner).finish()
    }
}
