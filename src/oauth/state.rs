//! Pending-authorization state management for CSRF protection.
//!
//! Each `begin_authorization` stores its state token in a keyed map with the
//! initiating user, so concurrent attempts from different users cannot
//! overwrite each other's pending state. Entries are single-use and expire.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Bytes of entropy in a state token (hex-encoded on the wire)
const STATE_TOKEN_BYTES: usize = 16;

/// A single in-flight authorization attempt.
#[derive(Clone, Debug)]
pub struct PendingEntry {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Keyed pending-state map with automatic expiration.
#[derive(Clone)]
pub struct PendingAuthorizations {
    states: Arc<Mutex<HashMap<String, PendingEntry>>>,
    expiry_duration: Duration,
}

impl PendingAuthorizations {
    /// Create a new map.
    ///
    /// # Arguments
    /// * `expiry_seconds` - How long states remain valid (default: 600 = 10 minutes)
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    /// Generate a new state token for `user_id` and store it.
    ///
    /// Returns the state token (16 random bytes, hex-encoded).
    pub fn issue(&self, user_id: &str) -> String {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = hex::encode(bytes);

        let entry = PendingEntry {
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        let mut states = self.states.lock().unwrap();
        states.insert(state.clone(), entry);

        state
    }

    /// Validate and consume a state token.
    ///
    /// Returns the PendingEntry if valid and not expired, None otherwise.
    /// The state is removed from the map (single-use).
    pub fn validate_and_consume(&self, state: &str) -> Option<PendingEntry> {
        let mut states = self.states.lock().unwrap();

        let entry = states.remove(state)?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry)
    }

    /// Clean up expired states (should be called periodically)
    pub fn cleanup_expired(&self) {
        let mut states = self.states.lock().unwrap();
        let now = Utc::now();

        states.retain(|_, entry| now - entry.created_at <= self.expiry_duration);
    }

    /// Get count of active states (for debugging/monitoring)
    pub fn count(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}

/// Background task to periodically clean up expired states
pub async fn run_state_cleanup(pending: PendingAuthorizations, interval_seconds: u64) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        pending.cleanup_expired();
        tracing::debug!(
            "Pending-state cleanup complete, {} states remaining",
            pending.count()
        );
    }
}
