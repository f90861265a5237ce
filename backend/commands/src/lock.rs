/// Per-command execution locks.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-flight lock keys per command id.
#[derive(Default)]
pub struct CommandLocker {
    held: Mutex<HashMap<String, HashSet<String>>>,
}

impl CommandLocker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take `key` for `command`. `None` when it is already held.
    pub fn try_acquire(self: &Arc<Self>, command: &str, key: &str) -> Option<LockGuard> {
        let mut held = self.lock();
        if !held.entry(command.to_string()).or_default().insert(key.to_string()) {
            return None;
        }
        debug!(command = %command, key = %key, "[Lock] Acquired");
        Some(LockGuard {
            locker: Arc::clone(self),
            command: command.to_string(),
            key: key.to_string(),
        })
    }

    pub fn is_locked(&self, command: &str, key: &str) -> bool {
        self.lock().get(command).is_some_and(|keys| keys.contains(key))
    }

    fn release(&self, command: &str, key: &str) {
        let mut held = self.lock();
        if let Some(keys) = held.get_mut(command) {
            keys.remove(key);
            if keys.is_empty() {
                held.remove(command);
            }
        }
        debug!(command = %command, key = %key, "[Lock] Released");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashSet<String>>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases its key on drop.
pub struct LockGuard {
    locker: Arc<CommandLocker>,
    command: String,
    key: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locker.release(&self.command, &self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_exclusive_until_dropped() {
        let locker = CommandLocker::new();
        let guard = locker.try_acquire("a", "u1").unwrap();
        assert!(locker.try_acquire("a", "u1").is_none());
        assert!(locker.try_acquire("a", "u2").is_some());
        assert!(locker.try_acquire("b", "u1").is_some());
        assert!(locker.is_locked("a", "u1"));
        drop(guard);
        assert!(!locker.is_locked("a", "u1"));
        assert!(locker.try_acquire("a", "u1").is_some());
    }
}
