//! A circuit breaker for guarding calls to external dependencies (the
//! relational store, the search index, the cache, the event bus), plus a
//! small named registry so call sites look up a breaker by dependency name
//! instead of reaching for a module-level singleton.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    Open(&'static str),
    #[error(transparent)]
    Inner(#[from] E),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakerSnapshot {
    pub name: &'static str,
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub timeout_secs: u64,
}

/// Three-state (closed/open/half-open) breaker around a single dependency.
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    half_open_success_threshold: u32,
    timeout: Duration,
    enabled: Arc<AtomicBool>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    fn new(
        name: &'static str,
        failure_threshold: u32,
        timeout: Duration,
        enabled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            failure_threshold,
            half_open_success_threshold: 2,
            timeout,
            enabled,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
            }),
        }
    }

    fn should_attempt_reset(inner: &Inner, timeout: Duration) -> bool {
        match inner.last_failure_at {
            Some(t) => t.elapsed() >= timeout,
            None => false,
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.half_open_success_threshold {
                    tracing::info!(circuit = self.name, "circuit breaker closed");
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!(circuit = self.name, "circuit breaker reopened");
                inner.state = CircuitState::Open;
                inner.success_count = 0;
            }
            CircuitState::Closed => {
                if inner.failure_count >= self.failure_threshold {
                    tracing::warn!(
                        circuit = self.name,
                        failures = inner.failure_count,
                        threshold = self.failure_threshold,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Runs `f` under breaker protection. If the breaker is open and the
    /// timeout hasn't elapsed, `f` is never invoked and `BreakerError::Open`
    /// is returned; otherwise the call proceeds (transitioning an open
    /// breaker to half-open first) and its outcome updates breaker state.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled.load(Ordering::Relaxed) {
            return f().await.map_err(BreakerError::Inner);
        }

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == CircuitState::Open {
                if Self::should_attempt_reset(&inner, self.timeout) {
                    tracing::info!(circuit = self.name, "circuit breaker entering half-open state");
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                } else {
                    return Err(BreakerError::Open(self.name));
                }
            }
        }

        match f().await {
            Ok(v) => {
                self.on_success();
                Ok(v)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().unwrap();
        BreakerSnapshot {
            name: self.name,
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            timeout_secs: self.timeout.as_secs(),
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        tracing::info!(circuit = self.name, previous_state = ?inner.state, "circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_at = None;
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().state == CircuitState::Open
    }
}

/// A named registry of breakers, one per external dependency, with a single
/// kill switch shared by all of them (matching the original's
/// `circuit_breaker_enabled` setting, but applied uniformly instead of
/// re-checked per module-level getter).
pub struct BreakerRegistry {
    enabled: Arc<AtomicBool>,
    breakers: HashMap<&'static str, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(enabled: bool, failure_threshold: u32, timeout: Duration) -> Self {
        let enabled = Arc::new(AtomicBool::new(enabled));
        let mut breakers = HashMap::new();
        for name in ["postgres", "search", "cache", "kafka"] {
            breakers.insert(
                name,
                Arc::new(CircuitBreaker::new(
                    name,
                    failure_threshold,
                    timeout,
                    enabled.clone(),
                )),
            );
        }
        Self { enabled, breakers }
    }

    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no circuit breaker registered for '{name}'"))
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut names: Vec<_> = self.breakers.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|n| self.breakers[n].snapshot())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(true, 2, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let reg = registry();
        let breaker = reg.get("postgres");

        for _ in 0..2 {
            let res: Result<(), BreakerError<&str>> =
                breaker.call(|| async { Err("boom") }).await;
            assert!(matches!(res, Err(BreakerError::Inner("boom"))));
        }

        assert!(breaker.is_open());
        let res: Result<(), BreakerError<&str>> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(res, Err(BreakerError::Open("postgres"))));
    }

    #[tokio::test]
    async fn half_open_recovers_after_timeout() {
        let reg = registry();
        let breaker = reg.get("search");

        for _ in 0..2 {
            let _: Result<(), BreakerError<&str>> = breaker.call(|| async { Err("x") }).await;
        }
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;

        for _ in 0..2 {
            let res: Result<(), BreakerError<&str>> = breaker.call(|| async { Ok(()) }).await;
            assert!(res.is_ok());
        }
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn kill_switch_bypasses_breaker_entirely() {
        let reg = BreakerRegistry::new(false, 1, Duration::from_secs(60));
        let breaker = reg.get("kafka");
        let _: Result<(), BreakerError<&str>> = breaker.call(|| async { Err("x") }).await;
        // With the breaker disabled, failures never open it.
        assert!(!breaker.is_open());
    }
}
