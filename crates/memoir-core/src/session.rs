//! Session lock state and the in-memory key holder
//!
//! States move `LoggedOut -> Locked -> Unlocked`, and back to `Locked` on a
//! manual lock or an idle timeout. The derived key exists only while the
//! session is unlocked; locking or logging out drops it, which zeroes it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::crypto::DerivedKey;
use crate::error::{MemoirError, Result};

/// Holder for the session's derived key
///
/// Readers take a copy with `snapshot()` instead of holding a guard, so a
/// concurrent `clear()` can never leave an in-flight operation with a
/// half-cleared key.
#[derive(Clone, Default)]
pub struct KeyHolder {
    inner: Arc<RwLock<Option<DerivedKey>>>,
}

impl KeyHolder {
    /// Create an empty holder
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a key (on unlock)
    pub async fn set(&self, key: DerivedKey) {
        *self.inner.write().await = Some(key);
    }

    /// Drop the key (on lock or logout)
    pub async fn clear(&self) {
        self.inner.write().await.take();
    }

    /// Copy out the current key
    pub async fn snapshot(&self) -> Result<DerivedKey> {
        self.inner
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(MemoirError::VaultLocked)
    }

    /// Check whether a key is installed
    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

/// Session lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No backend session
    LoggedOut,
    /// Logged in, key not available
    Locked,
    /// Logged in with the derived key in memory
    Unlocked,
}

/// Outcome of re-evaluating the idle timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    Stay,
    Lock,
}

/// Idle timeout over a monotonic clock
#[derive(Debug, Clone)]
pub struct LockTimer {
    timeout: Option<Duration>,
    last_activity: Instant,
}

impl LockTimer {
    /// Create a timer; 0 minutes disables auto-lock
    pub fn new(timeout_minutes: u32, now: Instant) -> Self {
        Self {
            timeout: Self::minutes(timeout_minutes),
            last_activity: now,
        }
    }

    fn minutes(minutes: u32) -> Option<Duration> {
        (minutes > 0).then(|| Duration::from_secs(u64::from(minutes) * 60))
    }

    /// Change the timeout
    pub fn set_timeout_minutes(&mut self, minutes: u32) {
        self.timeout = Self::minutes(minutes);
    }

    /// Current timeout, `None` when auto-lock is disabled
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Restart the idle window
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// The app was suspended; idle time counts from here
    pub fn on_background(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// The app resumed; lock if the idle window passed while suspended
    pub fn on_foreground(&mut self, now: Instant) -> LockDecision {
        if self.is_expired(now) {
            LockDecision::Lock
        } else {
            self.record_activity(now);
            LockDecision::Stay
        }
    }

    /// When the session should lock if nothing else happens
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| self.last_activity + timeout)
    }

    /// Whether the idle window has elapsed at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }
}

/// Session lock state machine
pub struct Session {
    state: RwLock<SessionState>,
    key: KeyHolder,
    timer: Mutex<LockTimer>,
    activity: Notify,
}

impl Session {
    /// Create a logged-out session
    pub fn new(auto_lock_timeout_minutes: u32) -> Self {
        Self {
            state: RwLock::new(SessionState::LoggedOut),
            key: KeyHolder::new(),
            timer: Mutex::new(LockTimer::new(auto_lock_timeout_minutes, Instant::now())),
            activity: Notify::new(),
        }
    }

    /// Get the current state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Check if the session is unlocked
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    /// Shared handle to the key holder
    pub fn key_holder(&self) -> KeyHolder {
        self.key.clone()
    }

    /// Record a successful backend login; the session starts locked
    pub async fn mark_logged_in(&self) {
        let mut state = self.state.write().await;
        if *state == SessionState::LoggedOut {
            *state = SessionState::Locked;
            debug!("Session logged in (locked)");
        }
    }

    /// Install a freshly derived key and unlock
    pub async fn unlock(&self, key: DerivedKey) -> Result<()> {
        let mut state = self.state.write().await;
        if *state == SessionState::LoggedOut {
            return Err(MemoirError::NotAuthenticated);
        }

        self.key.set(key).await;
        *state = SessionState::Unlocked;
        drop(state);

        self.timer.lock().await.record_activity(Instant::now());
        self.activity.notify_one();

        info!("Session unlocked");
        Ok(())
    }

    /// Replace the key of an unlocked session (after a master key change)
    pub async fn rotate_key(&self, key: DerivedKey) -> Result<()> {
        let state = self.state.read().await;
        if *state != SessionState::Unlocked {
            return Err(MemoirError::VaultLocked);
        }
        self.key.set(key).await;
        Ok(())
    }

    /// Lock: drop the key, keep the backend session
    pub async fn lock(&self) {
        let mut state = self.state.write().await;
        if *state == SessionState::Unlocked {
            self.key.clear().await;
            *state = SessionState::Locked;
            info!("Session locked");
        }
        drop(state);
        self.activity.notify_one();
    }

    /// Log out: drop the key and the backend session
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        self.key.clear().await;
        *state = SessionState::LoggedOut;
        drop(state);

        self.activity.notify_one();
        info!("Session logged out");
    }

    /// Record user activity, pushing the idle deadline back
    pub async fn touch(&self) {
        self.timer.lock().await.record_activity(Instant::now());
        self.activity.notify_one();
    }

    /// The app moved to the background
    pub async fn on_background(&self) {
        self.timer.lock().await.on_background(Instant::now());
    }

    /// The app returned to the foreground; locks if the idle window passed
    pub async fn on_foreground(&self) -> SessionState {
        if self.is_unlocked().await {
            let decision = self.timer.lock().await.on_foreground(Instant::now());
            if decision == LockDecision::Lock {
                debug!("Idle timeout exceeded while in background");
                self.lock().await;
            } else {
                self.activity.notify_one();
            }
        }
        self.state().await
    }

    /// Change the auto-lock timeout (0 disables it)
    pub async fn set_auto_lock_minutes(&self, minutes: u32) {
        self.timer.lock().await.set_timeout_minutes(minutes);
        self.activity.notify_one();
    }

    /// Lock the session once the idle deadline passes
    ///
    /// Runs until the task is aborted. Every activity, lock, or timeout change
    /// cancels the pending deadline and schedules a new one.
    pub async fn run_idle_watchdog(self: Arc<Self>) {
        loop {
            let deadline = if self.is_unlocked().await {
                self.timer.lock().await.deadline()
            } else {
                None
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {
                            let expired = self.timer.lock().await.is_expired(Instant::now());
                            if expired {
                                debug!("Idle timeout reached");
                                self.lock().await;
                            }
                        }
                        _ = self.activity.notified() => {}
                    }
                }
                None => self.activity.notified().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DerivedKey {
        DerivedKey::new([4u8; 32])
    }

    #[test]
    fn test_lock_timer_expiry() {
        let start = Instant::now();
        let mut timer = LockTimer::new(2, start);

        assert!(!timer.is_expired(start + Duration::from_secs(119)));
        assert!(timer.is_expired(start + Duration::from_secs(120)));

        timer.record_activity(start + Duration::from_secs(100));
        assert!(!timer.is_expired(start + Duration::from_secs(200)));
    }

    #[test]
    fn test_lock_timer_disabled() {
        let start = Instant::now();
        let timer = LockTimer::new(0, start);

        assert_eq!(timer.deadline(), None);
        assert!(!timer.is_expired(start + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_lock_timer_foreground() {
        let start = Instant::now();
        let mut timer = LockTimer::new(5, start);

        timer.on_background(start + Duration::from_secs(10));
        assert_eq!(
            timer.on_foreground(start + Duration::from_secs(60)),
            LockDecision::Stay
        );

        timer.on_background(start + Duration::from_secs(100));
        assert_eq!(
            timer.on_foreground(start + Duration::from_secs(100 + 301)),
            LockDecision::Lock
        );
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let session = Session::new(2);
        assert_eq!(session.state().await, SessionState::LoggedOut);

        // Cannot unlock before logging in
        assert!(matches!(
            session.unlock(key()).await,
            Err(MemoirError::NotAuthenticated)
        ));

        session.mark_logged_in().await;
        assert_eq!(session.state().await, SessionState::Locked);

        session.unlock(key()).await.unwrap();
        assert_eq!(session.state().await, SessionState::Unlocked);
        assert!(session.key_holder().is_set().await);

        session.lock().await;
        assert_eq!(session.state().await, SessionState::Locked);
        assert!(!session.key_holder().is_set().await);

        session.unlock(key()).await.unwrap();
        session.logout().await;
        assert_eq!(session.state().await, SessionState::LoggedOut);
        assert!(!session.key_holder().is_set().await);
    }

    #[tokio::test]
    async fn test_snapshot_survives_concurrent_lock() {
        let session = Session::new(2);
        session.mark_logged_in().await;
        session.unlock(key()).await.unwrap();

        let snapshot = session.key_holder().snapshot().await.unwrap();
        session.lock().await;

        // The copy taken before the lock is intact; new readers are refused
        assert_eq!(snapshot, key());
        assert!(matches!(
            session.key_holder().snapshot().await,
            Err(MemoirError::VaultLocked)
        ));
    }

    #[tokio::test]
    async fn test_rotate_key_requires_unlocked() {
        let session = Session::new(2);
        session.mark_logged_in().await;
        assert!(session.rotate_key(key()).await.is_err());

        session.unlock(key()).await.unwrap();
        session.rotate_key(DerivedKey::new([9u8; 32])).await.unwrap();
        assert_eq!(
            session.key_holder().snapshot().await.unwrap(),
            DerivedKey::new([9u8; 32])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_locks_after_idle_timeout() {
        let session = Arc::new(Session::new(2));
        session.mark_logged_in().await;
        session.unlock(key()).await.unwrap();

        let watchdog = tokio::spawn(session.clone().run_idle_watchdog());

        tokio::time::sleep(Duration::from_secs(60)).await;
        session.touch().await;

        // 90s after the last activity: still unlocked
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(session.state().await, SessionState::Unlocked);

        // Past the 120s window
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(session.state().await, SessionState::Locked);
        assert!(!session.key_holder().is_set().await);

        watchdog.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_after_long_background_locks() {
        let session = Session::new(1);
        session.mark_logged_in().await;
        session.unlock(key()).await.unwrap();

        session.on_background().await;
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(session.on_foreground().await, SessionState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_within_window_stays_unlocked() {
        let session = Session::new(1);
        session.mark_logged_in().await;
        session.unlock(key()).await.unwrap();

        session.on_background().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(session.on_foreground().await, SessionState::Unlocked);
    }
}
