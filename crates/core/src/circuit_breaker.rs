//! Circuit Breaker Pattern Implementation
//!
//! Per-dependency failure-rate gate wrapping a call with a fallback.
//! Breakers are internally locked: multiple callers may invoke `execute`
//! concurrently for the same dependency name.

use crate::{DomainError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive primary failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial
    pub open_duration: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            open_duration,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observer invoked on every state transition, outside the state lock.
/// Wired to the event bus by the adapters layer.
pub type TransitionHook = Arc<dyn Fn(&str, CircuitState) + Send + Sync>;

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

enum Attempt {
    Primary { trial: bool },
    Fallback,
}

/// Per-dependency circuit breaker
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    hook: Option<TransitionHook>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            hook: None,
        }
    }

    pub fn with_transition_hook(mut self, hook: TransitionHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Run `primary` through the breaker, falling back when the circuit is
    /// open. A successful fallback is not an error to the caller; if the
    /// fallback fails while the circuit is open, `CircuitOpen` is returned.
    pub async fn execute<T, P, F, PFut, FFut>(&self, primary: P, fallback: F) -> Result<T>
    where
        P: FnOnce() -> PFut,
        F: FnOnce() -> FFut,
        PFut: Future<Output = Result<T>>,
        FFut: Future<Output = Result<T>>,
    {
        match self.begin_attempt() {
            Attempt::Primary { trial } => match primary().await {
                Ok(value) => {
                    self.on_success(trial);
                    Ok(value)
                }
                Err(err) => {
                    self.on_failure(trial);
                    Err(err)
                }
            },
            Attempt::Fallback => {
                debug!(dependency = %self.name, "circuit open, taking fallback path");
                fallback().await.map_err(|err| {
                    DomainError::CircuitOpen(format!("{}: fallback failed: {}", self.name, err))
                })
            }
        }
    }

    /// Decide the path for this call and flip Open to HalfOpen when the
    /// open duration has elapsed. The lock is never held across an await.
    fn begin_attempt(&self) -> Attempt {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Attempt::Primary { trial: false },
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    drop(inner);
                    self.notify(CircuitState::HalfOpen);
                    Attempt::Primary { trial: true }
                } else {
                    Attempt::Fallback
                }
            }
            CircuitState::HalfOpen => {
                // Exactly one trial call probes the dependency; everyone
                // else stays on the fallback until the trial settles.
                if inner.trial_in_flight {
                    Attempt::Fallback
                } else {
                    inner.trial_in_flight = true;
                    Attempt::Primary { trial: true }
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        let closed_now = trial || inner.state == CircuitState::HalfOpen;
        if closed_now {
            inner.state = CircuitState::Closed;
            inner.trial_in_flight = false;
            inner.opened_at = None;
        }
        drop(inner);

        if closed_now {
            debug!(dependency = %self.name, "circuit closed after successful trial");
            self.notify(CircuitState::Closed);
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let opened_now = if trial {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            true
        } else {
            inner.consecutive_failures += 1;
            if inner.state == CircuitState::Closed
                && inner.consecutive_failures >= self.config.failure_threshold
            {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                true
            } else {
                false
            }
        };
        let failures = inner.consecutive_failures;
        drop(inner);

        if opened_now {
            warn!(
                dependency = %self.name,
                consecutive_failures = failures,
                "circuit opened"
            );
            self.notify(CircuitState::Open);
        }
    }

    fn notify(&self, state: CircuitState) {
        if let Some(hook) = &self.hook {
            hook(&self.name, state);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Hands out one shared breaker per dependency name
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    hook: Option<TransitionHook>,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            hook: None,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_transition_hook(mut self, hook: TransitionHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// The breaker for a dependency name, created on first use
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        if let Some(existing) = breakers.get(name) {
            return existing.clone();
        }

        let mut breaker = CircuitBreaker::new(name, self.config.clone());
        if let Some(hook) = &self.hook {
            breaker = breaker.with_transition_hook(hook.clone());
        }
        let breaker = Arc::new(breaker);
        breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    /// Current state of a known dependency, for dashboards and alerting
    pub fn state(&self, name: &str) -> Option<CircuitState> {
        self.breakers.lock().get(name).map(|b| b.state())
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing() -> Result<u32> {
        Err(DomainError::Infrastructure("dependency down".to_string()))
    }

    #[tokio::test]
    async fn test_success_passes_through_and_resets_counter() {
        let breaker = CircuitBreaker::new(
            "payments",
            CircuitBreakerConfig::new(3, Duration::from_secs(30)),
        );

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        assert_eq!(breaker.failure_count(), 2);

        let value = breaker
            .execute(|| async { Ok(42) }, || async { Ok(0) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(
            "payments",
            CircuitBreakerConfig::new(3, Duration::from_secs(30)),
        );

        for _ in 0..3 {
            let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_circuit_never_invokes_primary() {
        let breaker = CircuitBreaker::new(
            "search",
            CircuitBreakerConfig::new(1, Duration::from_millis(100)),
        );

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let primary_calls = Arc::new(AtomicU32::new(0));
        let calls = primary_calls.clone();
        let value = breaker
            .execute(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                || async { Ok(99) },
            )
            .await
            .unwrap();

        assert_eq!(value, 99);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_trial_after_open_duration() {
        let breaker = CircuitBreaker::new(
            "search",
            CircuitBreakerConfig::new(1, Duration::from_millis(100)),
        );

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;

        // 50ms later: still open, fallback only
        tokio::time::sleep(Duration::from_millis(50)).await;
        let value = breaker
            .execute(|| async { Ok(1) }, || async { Ok(99) })
            .await
            .unwrap();
        assert_eq!(value, 99);

        // 150ms after opening: half-open trial reaches the primary
        tokio::time::sleep(Duration::from_millis(100)).await;
        let value = breaker
            .execute(|| async { Ok(1) }, || async { Ok(99) })
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failed_trial_reopens_the_circuit() {
        let breaker = CircuitBreaker::new(
            "search",
            CircuitBreakerConfig::new(1, Duration::from_millis(50)),
        );

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker
            .execute(|| async { failing() }, || async { Ok(99) })
            .await;
        assert!(result.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_fallback_failure_while_open_surfaces_circuit_open() {
        let breaker = CircuitBreaker::new(
            "search",
            CircuitBreakerConfig::new(1, Duration::from_secs(30)),
        );

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;

        let result: Result<u32> = breaker
            .execute(|| async { Ok(1) }, || async { failing() })
            .await;
        assert!(matches!(result, Err(DomainError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_registry_hands_out_one_breaker_per_name() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.breaker("payments");
        let b = registry.breaker("payments");
        assert!(Arc::ptr_eq(&a, &b));

        assert_eq!(registry.state("payments"), Some(CircuitState::Closed));
        assert_eq!(registry.state("unknown"), None);
    }

    #[tokio::test]
    async fn test_transition_hook_observes_open_and_close() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = transitions.clone();
        let hook: TransitionHook = Arc::new(move |name: &str, state: CircuitState| {
            seen.lock().push((name.to_string(), state));
        });

        let breaker = CircuitBreaker::new(
            "mesh",
            CircuitBreakerConfig::new(1, Duration::from_millis(20)),
        )
        .with_transition_hook(hook);

        let _ = breaker.execute(|| async { failing() }, || async { Ok(0) }).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = breaker.execute(|| async { Ok(1) }, || async { Ok(0) }).await;

        let recorded = transitions.lock().clone();
        assert!(recorded.contains(&("mesh".to_string(), CircuitState::Open)));
        assert!(recorded.contains(&("mesh".to_string(), CircuitState::Closed)));
    }
}
