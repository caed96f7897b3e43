//! Concurrency policy for the writer state.
//!
//! The writer is generic over a [`Guard`] that decides how its mutable state
//! is protected:
//!
//! - [`Exclusive`] wraps the state in a `Mutex`. Every `write` and `close`
//!   holds it for the whole synchronous part of the call, so writes and
//!   rotations are totally ordered across threads.
//! - [`PassThrough`] wraps the state in a `RefCell` and takes no lock. The
//!   resulting writer is `Send` but not `Sync`, so sharing it between threads
//!   without external serialization does not compile.

use std::cell::RefCell;
use std::sync::{Mutex, PoisonError};

/// How writer state is serialized.
pub trait Guard {
    /// Container holding the guarded value.
    type Cell<T>;

    /// Put `value` under this guard.
    fn wrap<T>(value: T) -> Self::Cell<T>;

    /// Run `f` with exclusive access to the guarded value.
    fn with<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&mut T) -> R) -> R;
}

/// Real mutual exclusion. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exclusive;

impl Guard for Exclusive {
    type Cell<T> = Mutex<T>;

    fn wrap<T>(value: T) -> Mutex<T> {
        Mutex::new(value)
    }

    fn with<T, R>(cell: &Mutex<T>, f: impl FnOnce(&mut T) -> R) -> R {
        // A panic inside `f` cannot leave the state half-updated: the active
        // handle is only ever replaced by a fully opened one.
        let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

/// No synchronization, for callers that already guarantee a single writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Guard for PassThrough {
    type Cell<T> = RefCell<T>;

    fn wrap<T>(value: T) -> RefCell<T> {
        RefCell::new(value)
    }

    fn with<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *cell.borrow_mut())
    }
}
