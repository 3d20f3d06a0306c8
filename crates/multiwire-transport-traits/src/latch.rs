//! At-most-once callback latch.

use std::fmt;

use parking_lot::Mutex;

type Callback<T> = Box<dyn FnOnce(T) + Send>;

/// Holds a callback that may be invoked at most once, whichever of several
/// racing completions (success, failure, abort) gets there first.
///
/// The check and the take happen under one lock; the callback itself runs after
/// the lock is released, so it may freely touch the latch again.
pub struct OneShot<T> {
    callback: Mutex<Option<Callback<T>>>,
}

impl<T> OneShot<T> {
    /// Arms the latch with `callback`.
    pub fn new(callback: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// Invokes the callback with `value` if it has not fired yet.
    ///
    /// Returns `false` when the latch had already fired; `value` is dropped in
    /// that case, which for a connection releases the underlying socket.
    pub fn fire(&self, value: T) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    /// Returns `true` once the callback has been taken.
    pub fn has_fired(&self) -> bool {
        self.callback.lock().is_none()
    }
}

impl<T> fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("fired", &self.has_fired())
            .finish()
    }
}
