//! Process-wide render lock
//!
//! Every public render entry point holds this for its whole duration, so
//! the texture cache and the per-context managers are never touched by two
//! render calls at once. The lock is not reentrant: internal helpers must
//! not take it again.

use lazy_static::lazy_static;
use parking_lot::{Mutex, MutexGuard};

lazy_static! {
    static ref RENDER_LOCK: Mutex<()> = Mutex::new(());
}

pub fn acquire_render_lock() -> MutexGuard<'static, ()> {
    RENDER_LOCK.lock()
}

/// Non-blocking variant, `None` while another render call is running
pub fn try_acquire_render_lock() -> Option<MutexGuard<'static, ()>> {
    RENDER_LOCK.try_lock()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive() {
        let guard = acquire_render_lock();
        assert!(try_acquire_render_lock().is_none());

        // Other tests render in parallel, so only a blocking wait is
        // guaranteed to get the lock back
        let waiter = std::thread::spawn(|| {
            let _guard = acquire_render_lock();
        });
        drop(guard);
        waiter.join().expect("waiter acquires the released lock");
    }
}
