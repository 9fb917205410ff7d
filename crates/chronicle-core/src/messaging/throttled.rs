use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::ScopeId,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two outbound notices.
    pub global_min_interval: Duration,
    /// Minimum spacing between notices to the same scope.
    pub per_scope_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_scope_min_interval: Duration::from_millis(1050),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound notices.
///
/// Busy rooms can trigger many replies in a burst (`!roll` spam); this keeps
/// the bot under the transport's flood limits instead of collecting 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_scope: Mutex<HashMap<ScopeId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_scope: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_scope(&self, scope: &ScopeId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_scope.lock().await;
        map.entry(scope.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_scope_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle(&self, scope: &ScopeId) {
        let global_wait = { self.global.lock().await.reserve() };
        let scope_wait = {
            let lim = self.limiter_for_scope(scope).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(scope_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_notice(&self, scope: &ScopeId, text: &str) -> Result<()> {
        self.throttle(scope).await;
        self.inner.send_notice(scope, text).await
    }
}
