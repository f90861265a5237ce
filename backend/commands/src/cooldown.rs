/// Per-user, per-command cooldowns.
///
/// Each (user, command) pair gets a fixed window starting at its first use.
/// `ratelimit` uses are allowed per window; expired windows are reset on
/// the next hit and dropped by `sweep`.
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    Allowed,
    /// Over the limit; the window ends after `remaining`.
    Limited { remaining: Duration },
}

#[derive(Debug)]
struct CooldownEntry {
    window_end: Instant,
    uses: u32,
}

#[derive(Default)]
pub struct CooldownManager {
    entries: Mutex<HashMap<(String, String), CooldownEntry>>,
}

impl CooldownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one use of `command` by `user_id`.
    pub async fn hit(
        &self,
        user_id: &str,
        command: &str,
        window: Duration,
        ratelimit: u32,
    ) -> CooldownCheck {
        if window.is_zero() {
            return CooldownCheck::Allowed;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry((user_id.to_string(), command.to_string()))
            .or_insert_with(|| CooldownEntry {
                window_end: now + window,
                uses: 0,
            });

        if now >= entry.window_end {
            entry.window_end = now + window;
            entry.uses = 0;
        }

        if entry.uses >= ratelimit {
            let remaining = entry.window_end - now;
            debug!(
                user = %user_id,
                command = %command,
                remaining_ms = remaining.as_millis() as u64,
                "[Cooldown] Limited"
            );
            return CooldownCheck::Limited { remaining };
        }
        entry.uses += 1;
        CooldownCheck::Allowed
    }

    /// Drop expired windows. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.window_end > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
