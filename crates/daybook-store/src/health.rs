// ABOUTME: Health and readiness signals derived from the backend link.
// ABOUTME: Health issues a live ping per call; readiness reads the link's cached state only.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::link::{BackendLink, LinkState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
}

/// Result of one live probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: Health,
    pub timestamp: DateTime<Utc>,
    pub link: LinkState,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == Health::Healthy
    }
}

/// Last observed connectivity, without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub link: LinkState,
}

#[derive(Clone)]
pub struct HealthReporter {
    link: BackendLink,
}

impl HealthReporter {
    pub fn new(link: BackendLink) -> Self {
        Self { link }
    }

    /// Probe the backend now. A failed probe on a live connection also
    /// reports the loss to the link supervisor.
    pub async fn health(&self) -> HealthReport {
        let status = match self.link.ping().await {
            Ok(()) => Health::Healthy,
            Err(e) => {
                tracing::error!(error = %e, "backend health check failed");
                Health::Degraded
            }
        };
        HealthReport {
            status,
            timestamp: Utc::now(),
            link: self.link.state(),
        }
    }

    pub fn ready(&self) -> Readiness {
        let link = self.link.state();
        Readiness {
            ready: link == LinkState::Ready,
            link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::link::LinkConfig;
    use std::sync::Arc;

    async fn connected(backend: &Arc<MemoryBackend>) -> HealthReporter {
        let link = BackendLink::new(Arc::new(backend.connector()), LinkConfig::default());
        link.connect().await.unwrap();
        HealthReporter::new(link)
    }

    #[tokio::test]
    async fn healthy_and_ready_when_connected() {
        let backend = MemoryBackend::new();
        let reporter = connected(&backend).await;

        assert!(reporter.health().await.is_healthy());
        assert!(reporter.ready().ready);
    }

    #[tokio::test]
    async fn degraded_and_not_ready_before_connect() {
        let backend = MemoryBackend::new();
        let link = BackendLink::new(Arc::new(backend.connector()), LinkConfig::default());
        let reporter = HealthReporter::new(link);

        assert_eq!(reporter.health().await.status, Health::Degraded);
        assert!(!reporter.ready().ready);
    }

    #[tokio::test]
    async fn health_sees_a_blip_that_readiness_does_not() {
        let backend = MemoryBackend::new();
        let reporter = connected(&backend).await;
        let pings_before = reporter.link.stats().ping.calls;

        backend.set_online(false);
        // Readiness is cached and still reflects the last observed state.
        assert!(reporter.ready().ready);
        assert_eq!(reporter.link.stats().ping.calls, pings_before);

        // Health probes live and sees the outage.
        assert_eq!(reporter.health().await.status, Health::Degraded);
        assert_eq!(reporter.link.stats().ping.calls, pings_before + 1);
    }
}
