//! Single-pass retry queue for accounts whose login failed.

use std::collections::HashSet;

/// Emails waiting for their one retry.
///
/// An email can be retried at most once per run: enqueueing it again after
/// [`RetryQueue::take_pending`] handed it out moves it to the exhausted list.
#[derive(Debug, Default)]
pub struct RetryQueue {
    pending: Vec<String>,
    attempted: HashSet<String>,
    exhausted: Vec<String>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an account for retry. Returns `false` when it already had its retry.
    pub fn enqueue(&mut self, email: &str) -> bool {
        if self.attempted.contains(email) {
            if !self.exhausted.iter().any(|e| e == email) {
                self.exhausted.push(email.to_string());
            }
            return false;
        }
        if !self.is_pending(email) {
            self.pending.push(email.to_string());
        }
        true
    }

    /// Hand out every pending email, clearing the marker before the retry runs.
    pub fn take_pending(&mut self) -> Vec<String> {
        let pending = std::mem::take(&mut self.pending);
        self.attempted.extend(pending.iter().cloned());
        pending
    }

    /// Record an account that was handed out but never got to run.
    pub fn mark_exhausted(&mut self, email: &str) {
        if !self.exhausted.iter().any(|e| e == email) {
            self.exhausted.push(email.to_string());
        }
    }

    pub fn is_pending(&self, email: &str) -> bool {
        self.pending.iter().any(|e| e == email)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn exhausted(&self) -> &[String] {
        &self.exhausted
    }
}
