//! Published address resolution
//!
//! The first resolution of a `(service, port, index)` key asks compose for the
//! published address, waits for the health probe to pass, and caches the
//! address on the environment. Later calls return the cached address without
//! touching compose or the probe.

use crate::retry::poll_until;
use crate::{Environment, HealthProbe, HttpProbe, ProbeError, Result, TestkitError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Container port used when none is given
pub const DEFAULT_PORT: u16 = 80;

/// One published endpoint of one service instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub service: String,
    pub port: u16,
    /// 1-based replica index
    pub index: u32,
}

impl ServiceKey {
    pub fn new(service: impl Into<String>, port: u16, index: u32) -> Self {
        Self {
            service: service.into(),
            port,
            index,
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.service, self.port, self.index)
    }
}

/// Options for [`Environment::resolve_address`]
#[derive(Clone)]
pub struct ResolveOptions {
    /// Replica index, starting at 1 (default 1)
    pub instance_index: u32,
    /// Readiness check (default [`HttpProbe`])
    pub probe: Option<Arc<dyn HealthProbe>>,
    /// Budget for the probe to pass (default `probe.timeout_secs`, 60s)
    pub probe_timeout: Option<Duration>,
    /// Delay between probe attempts (default `probe.poll_interval_ms`, 250ms)
    pub poll_interval: Option<Duration>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            instance_index: 1,
            probe: None,
            probe_timeout: None,
            poll_interval: None,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_index(mut self, index: u32) -> Self {
        self.instance_index = index;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

impl std::fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("instance_index", &self.instance_index)
            .field("custom_probe", &self.probe.is_some())
            .field("probe_timeout", &self.probe_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Environment {
    /// Address of `service` on container port 80, probed over HTTP
    pub async fn resolve_service(&self, service: &str) -> Result<String> {
        self.resolve_address(service, DEFAULT_PORT, ResolveOptions::default())
            .await
    }

    /// Resolve the published address of a service port, once it is healthy.
    ///
    /// Instance indexes start at 1; index 0 is rejected before compose is asked.
    /// Concurrent first-time calls for the same key are not merged; each
    /// queries compose and probes on its own. A key whose probe never passes
    /// is not cached, so a later call starts over.
    pub async fn resolve_address(
        &self,
        service: &str,
        port: u16,
        options: ResolveOptions,
    ) -> Result<String> {
        if options.instance_index == 0 {
            return Err(TestkitError::InvalidInstanceIndex {
                service: service.to_string(),
                index: 0,
            });
        }

        let key = ServiceKey::new(service, port, options.instance_index);
        if let Some(address) = self.cached_address(&key) {
            return Ok(address);
        }

        let address = self
            .runner
            .port(&self.project, service, port, key.index)
            .await
            .map_err(|e| TestkitError::PortLookupFailure {
                project: self.project.project_name.clone(),
                service: service.to_string(),
                port,
                index: key.index,
                source: e,
            })?;

        let probe = options
            .probe
            .unwrap_or_else(|| Arc::new(HttpProbe::new()));
        let budget = options
            .probe_timeout
            .unwrap_or_else(|| self.probe_defaults.timeout());
        let interval = options
            .poll_interval
            .unwrap_or_else(|| self.probe_defaults.poll_interval());

        tracing::debug!(
            project = %self.project.project_name,
            "Waiting for {} at {} (budget {:?})",
            key,
            address,
            budget
        );
        wait_until_healthy(&address, probe.as_ref(), budget, interval)
            .await
            .map_err(|(attempts, last_error)| TestkitError::ProbeTimeout {
                service: service.to_string(),
                port,
                index: key.index,
                address: address.clone(),
                budget,
                attempts,
                last_error,
            })?;

        self.lock_addresses().insert(key, address.clone());
        Ok(address)
    }

    /// Addresses resolved so far
    pub fn cached_address(&self, key: &ServiceKey) -> Option<String> {
        self.lock_addresses().get(key).cloned()
    }

    fn lock_addresses(&self) -> MutexGuard<'_, HashMap<ServiceKey, String>> {
        self.addresses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn wait_until_healthy(
    address: &str,
    probe: &dyn HealthProbe,
    budget: Duration,
    interval: Duration,
) -> std::result::Result<(), (u32, Option<ProbeError>)> {
    let last_logged_cell: Mutex<Option<String>> = Mutex::new(None);
    let last_logged = &last_logged_cell;
    poll_until(budget, interval, move || async move {
        let result = probe.check(address).await;
        if let Err(ref e) = result {
            let message = e.to_string();
            let mut logged = last_logged.lock().unwrap_or_else(|p| p.into_inner());
            if logged.as_deref() != Some(message.as_str()) {
                tracing::warn!("Health check of {} failed, retrying: {}", address, message);
                *logged = Some(message);
            }
        }
        result
    })
    .await
    .map_err(|exhausted| (exhausted.attempts, exhausted.last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe_fn;
    use crate::test_support::{MockCall, MockCompose};
    use dct_compose::ComposeProject;
    use dct_config::ProbeConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_environment(mock: &Arc<MockCompose>) -> Environment {
        Environment::new(
            ComposeProject::new("/srv/app/docker-compose.yml", "dct_test"),
            false,
            mock.clone(),
            ProbeConfig::default(),
        )
    }

    fn counting_probe(counter: Arc<AtomicU32>, healthy_after: u32) -> Arc<dyn HealthProbe> {
        probe_fn(move |_address| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= healthy_after {
                    Ok(())
                } else {
                    Err(ProbeError::Failed("connection refused".to_string()))
                }
            }
        })
    }

    fn port_calls(mock: &MockCompose) -> usize {
        mock.get_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Port { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_second_resolution_hits_cache() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("nginx", 80, 1, "0.0.0.0:49153");
        let environment = test_environment(&mock);
        let probes = Arc::new(AtomicU32::new(0));
        let options = ResolveOptions::new().probe(counting_probe(probes.clone(), 1));

        let first = environment
            .resolve_address("nginx", 80, options.clone())
            .await
            .unwrap();
        let second = environment
            .resolve_address("nginx", 80, options)
            .await
            .unwrap();

        assert_eq!(first, "0.0.0.0:49153");
        assert_eq!(second, first);
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert_eq!(port_calls(&mock), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_retried_until_healthy() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("api", 8080, 1, "0.0.0.0:50000");
        let environment = test_environment(&mock);
        let probes = Arc::new(AtomicU32::new(0));

        let address = environment
            .resolve_address(
                "api",
                8080,
                ResolveOptions::new().probe(counting_probe(probes.clone(), 4)),
            )
            .await
            .unwrap();

        assert_eq!(address, "0.0.0.0:50000");
        assert_eq!(probes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_after_budget_and_not_cached() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("db", 5432, 1, "0.0.0.0:55432");
        let environment = test_environment(&mock);
        let probes = Arc::new(AtomicU32::new(0));
        let options = ResolveOptions::new()
            .probe(counting_probe(probes.clone(), u32::MAX))
            .probe_timeout(Duration::from_secs(3));

        let start = tokio::time::Instant::now();
        let err = environment
            .resolve_address("db", 5432, options.clone())
            .await
            .unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(3));

        match err {
            TestkitError::ProbeTimeout {
                service,
                port,
                index,
                address,
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(service, "db");
                assert_eq!(port, 5432);
                assert_eq!(index, 1);
                assert_eq!(address, "0.0.0.0:55432");
                assert!(attempts > 1);
                assert!(last_error.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(environment
            .cached_address(&ServiceKey::new("db", 5432, 1))
            .is_none());

        // Not cached: compose is asked again
        let _ = environment.resolve_address("db", 5432, options).await;
        assert_eq!(port_calls(&mock), 2);
    }

    #[tokio::test]
    async fn test_instance_index_is_part_of_key() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("worker", 9000, 1, "0.0.0.0:49001");
        mock.set_port("worker", 9000, 2, "0.0.0.0:49002");
        let environment = test_environment(&mock);
        let ok = probe_fn(|_| async { Ok(()) });

        let first = environment
            .resolve_address("worker", 9000, ResolveOptions::new().probe(ok.clone()))
            .await
            .unwrap();
        let second = environment
            .resolve_address(
                "worker",
                9000,
                ResolveOptions::new().probe(ok).instance_index(2),
            )
            .await
            .unwrap();

        assert_eq!(first, "0.0.0.0:49001");
        assert_eq!(second, "0.0.0.0:49002");
        assert!(mock.was_called(&MockCall::Port {
            service: "worker".to_string(),
            port: 9000,
            index: 2
        }));
    }

    #[tokio::test]
    async fn test_port_lookup_failure() {
        let mock = Arc::new(MockCompose::new());
        let environment = test_environment(&mock);
        let err = environment
            .resolve_address("missing", 80, ResolveOptions::new())
            .await
            .unwrap_err();
        match err {
            TestkitError::PortLookupFailure {
                service, port, index, ..
            } => {
                assert_eq!(service, "missing");
                assert_eq!(port, 80);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_instance_index_zero_rejected() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("worker", 9000, 0, "0.0.0.0:49000");
        let environment = test_environment(&mock);

        let err = environment
            .resolve_address("worker", 9000, ResolveOptions::new().instance_index(0))
            .await
            .unwrap_err();

        match err {
            TestkitError::InvalidInstanceIndex { service, index } => {
                assert_eq!(service, "worker");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(mock.get_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_probe_timeout() {
        let mock = Arc::new(MockCompose::new());
        mock.set_port("api", 8080, 1, "0.0.0.0:50000");
        let environment = test_environment(&mock);
        let probes = Arc::new(AtomicU32::new(0));

        let address = environment
            .resolve_address(
                "api",
                8080,
                ResolveOptions::new()
                    .probe(counting_probe(probes.clone(), 3))
                    .probe_timeout(Duration::MAX),
            )
            .await
            .unwrap();

        assert_eq!(address, "0.0.0.0:50000");
        assert_eq!(probes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_service_key_display() {
        assert_eq!(ServiceKey::new("nginx", 80, 1).to_string(), "nginx:80:1");
    }
}
