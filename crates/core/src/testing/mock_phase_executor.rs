//! Mock phase executor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::account::{Account, PhaseResult};
use crate::phase::{PhaseContext, PhaseError, PhaseExecutor, PhaseKind};

type Response = Result<PhaseResult, PhaseError>;

/// Mock implementation of the PhaseExecutor trait.
///
/// Provides controllable behavior for testing:
/// - Scripted responses per (email, phase), consumed in order
/// - A default response once a script runs dry
/// - Recorded calls for assertions
/// - Simulated phase duration and in-flight tracking
/// - Simulated panics
#[derive(Debug, Clone)]
pub struct MockPhaseExecutor {
    responses: Arc<RwLock<HashMap<(String, PhaseKind), VecDeque<Response>>>>,
    default_response: Arc<RwLock<Response>>,
    panics: Arc<RwLock<HashSet<(String, PhaseKind)>>>,
    calls: Arc<RwLock<Vec<(String, PhaseKind)>>>,
    delay: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockPhaseExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPhaseExecutor {
    /// Create a mock where every phase succeeds with zero points.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            default_response: Arc::new(RwLock::new(Ok(PhaseResult::default()))),
            panics: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue the next response for `email`'s `kind` phase.
    pub async fn respond(&self, email: &str, kind: PhaseKind, response: Response) {
        self.responses
            .write()
            .await
            .entry((email.to_string(), kind))
            .or_default()
            .push_back(response);
    }

    pub async fn set_default_response(&self, response: Response) {
        *self.default_response.write().await = response;
    }

    /// Make the `kind` phase of `email` panic.
    pub async fn panic_on(&self, email: &str, kind: PhaseKind) {
        self.panics.write().await.insert((email.to_string(), kind));
    }

    /// Simulated duration of every phase.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Every call, in start order.
    pub async fn calls(&self) -> Vec<(String, PhaseKind)> {
        self.calls.read().await.clone()
    }

    pub async fn calls_for(&self, email: &str) -> Vec<PhaseKind> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(e, _)| e == email)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub async fn call_count(&self, email: &str, kind: PhaseKind) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(e, k)| e == email && *k == kind)
            .count()
    }

    /// Highest number of phases that were running at the same time.
    pub async fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the phase panics.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhaseExecutor for MockPhaseExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, ctx: &PhaseContext, account: &Account) -> Result<PhaseResult, PhaseError> {
        let key = (account.email.clone(), ctx.kind);
        self.calls.write().await.push(key.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panics.read().await.contains(&key) {
            panic!("mock {} phase panicked for {}", ctx.kind, account.email);
        }

        let scripted = self
            .responses
            .write()
            .await
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(response) => response,
            None => self.default_response.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_scripted_then_default() {
        let mock = MockPhaseExecutor::new();
        mock.respond("a@example.com", PhaseKind::Desktop, Ok(PhaseResult::new(5, 1)))
            .await;
        mock.set_default_response(Err(PhaseError::failed("offline"))).await;

        let ctx = fixtures::phase_context(PhaseKind::Desktop);
        let account = fixtures::account("a@example.com");
        assert_eq!(mock.execute(&ctx, &account).await, Ok(PhaseResult::new(5, 1)));
        assert_eq!(
            mock.execute(&ctx, &account).await,
            Err(PhaseError::failed("offline"))
        );
        assert_eq!(mock.call_count("a@example.com", PhaseKind::Desktop).await, 2);
        assert_eq!(mock.max_in_flight().await, 1);
    }
}
