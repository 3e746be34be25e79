use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp_ms: u64,
}

impl HealthCheckResult {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            healthy: true,
            latency_ms: Some(latency.as_millis() as u64),
            error: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            error: Some(error),
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckSnapshot {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub timestamp_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

#[derive(Debug, Default)]
pub struct HealthTracker {
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_result: Option<HealthCheckResult>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, result: HealthCheckResult) {
        if result.healthy {
            self.consecutive_successes += 1;
            if self.consecutive_failures > 0 {
                tracing::info!(
                    failures = self.consecutive_failures,
                    "database recovered after failures"
                );
            }
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.consecutive_successes = 0;
            tracing::warn!(
                failures = self.consecutive_failures,
                error = result.error.as_deref().unwrap_or("unknown"),
                "database health check failed"
            );
        }
        self.last_result = Some(result);
    }

    pub fn snapshot(&self) -> HealthCheckSnapshot {
        let last = self.last_result.as_ref();
        HealthCheckSnapshot {
            // No result yet counts as healthy so startup is not reported degraded.
            healthy: last.map(|r| r.healthy).unwrap_or(true),
            latency_ms: last.and_then(|r| r.latency_ms),
            error: last.and_then(|r| r.error.clone()),
            timestamp_ms: last.map(|r| r.timestamp_ms),
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
