use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// How long the success mark stays on a card after a committed move.
pub const DEFAULT_SUCCESS_TTL: Duration = Duration::from_millis(1500);

/// How long the error mark stays on a card after a rolled back move.
pub const DEFAULT_ERROR_TTL: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Success,
    Error,
}

/// Transient per-card marks shown on the board while and after a move is
/// persisted. Expiry is evaluated lazily against tokio's clock.
#[derive(Debug, Clone)]
pub struct FeedbackTracker {
    success_ttl: Duration,
    error_ttl: Duration,
    marks: HashMap<String, (FeedbackStatus, Instant)>,
    updating: HashSet<String>,
}

impl Default for FeedbackTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_TTL, DEFAULT_ERROR_TTL)
    }
}

impl FeedbackTracker {
    pub fn new(success_ttl: Duration, error_ttl: Duration) -> Self {
        Self {
            success_ttl,
            error_ttl,
            marks: HashMap::new(),
            updating: HashSet::new(),
        }
    }

    /// Flag a card as waiting on the remote store. Drops any earlier mark.
    pub fn begin(&mut self, card_id: &str) {
        self.marks.remove(card_id);
        self.updating.insert(card_id.to_string());
    }

    pub fn finish(&mut self, card_id: &str, status: FeedbackStatus) {
        self.updating.remove(card_id);
        let ttl = match status {
            FeedbackStatus::Success => self.success_ttl,
            FeedbackStatus::Error => self.error_ttl,
        };
        self.marks
            .insert(card_id.to_string(), (status, Instant::now() + ttl));
    }

    pub fn is_updating(&self, card_id: &str) -> bool {
        self.updating.contains(card_id)
    }

    /// The live mark for a card, if it has not expired yet.
    pub fn status(&self, card_id: &str) -> Option<FeedbackStatus> {
        let now = Instant::now();
        self.marks
            .get(card_id)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(status, _)| *status)
    }

    /// Forget expired marks.
    pub fn prune(&mut self) {
        let now = Instant::now();
        self.marks.retain(|_, (_, expires_at)| *expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
