use crate::base::priority::RequestPriority;
use serde::{Deserialize, Serialize};

/// Upper bound on how many *unique* DNS resolves a PAC script may make.
/// Failsafe for scripts that resolve an absurd number of hosts or that
/// misbehave under tracing. Normal scripts never get close.
pub const MAX_UNIQUE_RESOLVE_DNS_PER_EXEC: usize = 20;

/// Approximate number of bytes of `alert()`/error output buffered per
/// attempt before falling back to blocking mode.
pub const MAX_ALERTS_AND_ERRORS_BYTES: usize = 2048;

/// Name of the thread that runs PAC scripts.
pub const DEFAULT_WORKER_THREAD_NAME: &str = "Proxy Resolver";

/// Tunables for the tracing PAC resolver.
///
/// # Example
///
/// ```rust,ignore
/// use pacresolver::proxy::TracingResolverConfig;
///
/// let config = TracingResolverConfig::default()
///     .with_max_unique_dns_per_exec(8)
///     .with_worker_thread_name("pac-worker");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingResolverConfig {
    /// Distinct (host, operation) lookups allowed per job.
    pub max_unique_dns_per_exec: usize,
    /// Byte budget for buffered alerts and errors per attempt.
    pub max_alerts_and_errors_bytes: usize,
    /// Name given to each resolver's worker thread.
    pub worker_thread_name: String,
    /// Priority attached to every DNS request issued by a script.
    pub dns_priority: RequestPriority,
}

impl Default for TracingResolverConfig {
    fn default() -> Self {
        Self {
            max_unique_dns_per_exec: MAX_UNIQUE_RESOLVE_DNS_PER_EXEC,
            max_alerts_and_errors_bytes: MAX_ALERTS_AND_ERRORS_BYTES,
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
            dns_priority: RequestPriority::default(),
        }
    }
}

impl TracingResolverConfig {
    pub fn with_max_unique_dns_per_exec(mut self, max: usize) -> Self {
        self.max_unique_dns_per_exec = max;
        self
    }

    pub fn with_max_alerts_and_errors_bytes(mut self, max: usize) -> Self {
        self.max_alerts_and_errors_bytes = max;
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_dns_priority(mut self, priority: RequestPriority) -> Self {
        self.dns_priority = priority;
        self
    }
}
