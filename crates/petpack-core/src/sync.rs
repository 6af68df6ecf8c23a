//! Lock helpers that recover from poisoning.
//!
//! A panic inside a cache loader or registry callback must not wedge every
//! later caller, so poisoned guards are recovered and logged.

use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

fn recover<G>(
    result: LockResult<G>,
    site: &'static str,
    op: &'static str,
    kind: &'static str,
) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(site, op, kind, "Lock poisoned by a panicking holder; continuing with its data");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    site: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), site, op, "read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    site: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), site, op, "write")
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    site: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), site, op, "mutex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn panic_on_thread(hold: impl FnOnce() + Send + 'static) {
        let _ = std::thread::spawn(hold).join();
    }

    #[test]
    fn test_poisoned_mutex_is_recovered() {
        let lock = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&lock);
        panic_on_thread(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        });

        assert!(lock.is_poisoned());
        *mutex_lock(&lock, "sync::tests", "recover") += 1;
        assert_eq!(*mutex_lock(&lock, "sync::tests", "read"), 2);
    }

    #[test]
    fn test_poisoned_rwlock_is_recovered() {
        let lock = Arc::new(RwLock::new(vec!["builtin.default".to_string()]));
        let poisoner = Arc::clone(&lock);
        panic_on_thread(move || {
            let _guard = poisoner.write().unwrap();
            panic!("poison the lock");
        });

        assert!(lock.is_poisoned());
        rw_write(&lock, "sync::tests", "push").push("user.night".to_string());
        assert_eq!(rw_read(&lock, "sync::tests", "len").len(), 2);
    }
}
