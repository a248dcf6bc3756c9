//! Worker configuration.
//!
//! Everything comes from the environment; nothing here changes core
//! semantics beyond the documented knobs (task queue name, namespace,
//! optional blob endpoint, spill threshold, grace window).

use std::time::Duration;

use palisade_core::{DEFAULT_SPILL_THRESHOLD, clamp_spill_threshold};

/// Environment variable naming the task queue this worker serves.
pub const ENV_TASK_QUEUE: &str = "PALISADE_TASK_QUEUE";
/// Environment variable naming the namespace.
pub const ENV_NAMESPACE: &str = "PALISADE_NAMESPACE";
/// Environment variable pointing at the blob store for spilled payloads.
pub const ENV_BLOB_ENDPOINT: &str = "PALISADE_BLOB_ENDPOINT";
/// Environment variable overriding the spill threshold in bytes.
pub const ENV_SPILL_THRESHOLD: &str = "PALISADE_SPILL_THRESHOLD_BYTES";

/// Configuration of one worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Task queue this worker listens on (e.g. `workflows-dev`).
    pub task_queue: String,
    /// Namespace identifier.
    pub namespace: String,
    /// Optional blob store endpoint for spilled payloads.
    pub blob_endpoint: Option<String>,
    /// Spill threshold in bytes, clamped to the shared bounds.
    pub spill_threshold: usize,
    /// How long cancellation waits for in-flight activities to drain.
    pub grace_period: Duration,
    /// Run-level deadline; `None` means unbounded.
    pub run_timeout: Option<Duration>,
    /// Cap on concurrently running activities per run; `None` = unbounded.
    pub max_concurrency: Option<usize>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            task_queue: "workflows-dev".into(),
            namespace: "default".into(),
            blob_endpoint: None,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            grace_period: Duration::from_secs(5),
            run_timeout: None,
            max_concurrency: None,
        }
    }
}

impl WorkerSettings {
    /// Read settings from the process environment, falling back to the
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(queue) = lookup(ENV_TASK_QUEUE).filter(|v| !v.is_empty()) {
            settings.task_queue = queue;
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE).filter(|v| !v.is_empty()) {
            settings.namespace = namespace;
        }
        if let Some(endpoint) = lookup(ENV_BLOB_ENDPOINT).filter(|v| !v.is_empty()) {
            settings.blob_endpoint = Some(endpoint);
        }
        if let Some(bytes) = lookup(ENV_SPILL_THRESHOLD).and_then(|v| v.parse::<usize>().ok()) {
            settings.spill_threshold = clamp_spill_threshold(bytes);
        }
        settings
    }

    /// Override the grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Override the run deadline.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Override the per-run activity concurrency cap.
    #[must_use]
    pub fn with_max_concurrency(mut self, cap: usize) -> Self {
        self.max_concurrency = Some(cap.max(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::MAX_SPILL_THRESHOLD;

    #[test]
    fn defaults() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.task_queue, "workflows-dev");
        assert_eq!(settings.namespace, "default");
        assert!(settings.blob_endpoint.is_none());
        assert_eq!(settings.spill_threshold, DEFAULT_SPILL_THRESHOLD);
        assert_eq!(settings.grace_period, Duration::from_secs(5));
        assert!(settings.run_timeout.is_none());
        assert!(settings.max_concurrency.is_none());
    }

    #[test]
    fn builders() {
        let settings = WorkerSettings::default()
            .with_grace_period(Duration::from_secs(1))
            .with_run_timeout(Duration::from_secs(30))
            .with_max_concurrency(0);
        assert_eq!(settings.grace_period, Duration::from_secs(1));
        assert_eq!(settings.run_timeout, Some(Duration::from_secs(30)));
        // Zero is promoted to the minimum useful cap.
        assert_eq!(settings.max_concurrency, Some(1));
    }

    #[test]
    fn from_lookup_reads_and_clamps() {
        let settings = WorkerSettings::from_lookup(|name| match name {
            ENV_TASK_QUEUE => Some("workflows-prod".into()),
            ENV_NAMESPACE => Some("sec-eng".into()),
            ENV_BLOB_ENDPOINT => Some("http://blob.internal".into()),
            ENV_SPILL_THRESHOLD => Some("99999999".into()),
            _ => None,
        });

        assert_eq!(settings.task_queue, "workflows-prod");
        assert_eq!(settings.namespace, "sec-eng");
        assert_eq!(settings.blob_endpoint.as_deref(), Some("http://blob.internal"));
        assert_eq!(settings.spill_threshold, MAX_SPILL_THRESHOLD);
    }

    #[test]
    fn from_lookup_ignores_empty_and_garbage() {
        let settings = WorkerSettings::from_lookup(|name| match name {
            ENV_TASK_QUEUE => Some(String::new()),
            ENV_SPILL_THRESHOLD => Some("not-a-number".into()),
            _ => None,
        });
        assert_eq!(settings.task_queue, "workflows-dev");
        assert_eq!(settings.spill_threshold, DEFAULT_SPILL_THRESHOLD);
    }
}
