use crate::adapters::http::HttpClient;
use crate::core::engine::ScanEngine;
use crate::core::registry::ProbeRegistry;
use crate::domain::model::{ProbePolicy, ResultSet};
use crate::utils::error::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What one scan produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub results: ResultSet,
    /// Selected names that matched no registered probe.
    pub skipped: Vec<String>,
}

/// Registry, shared client and engine wired together for repeated scans.
pub struct Scanner {
    registry: ProbeRegistry,
    client: Arc<HttpClient>,
    engine: ScanEngine,
}

impl Scanner {
    pub fn new(registry: ProbeRegistry, policy: ProbePolicy, max_workers: usize) -> Result<Self> {
        let client = Arc::new(HttpClient::new(Arc::new(policy))?);
        Self::with_client(registry, client, max_workers)
    }

    pub fn with_client(
        registry: ProbeRegistry,
        client: Arc<HttpClient>,
        max_workers: usize,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            client,
            engine: ScanEngine::new(max_workers)?,
        })
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub async fn scan(&self, email: &str, selected: &[String]) -> Result<ScanOutcome> {
        self.scan_until_cancelled(email, selected, CancellationToken::new())
            .await
    }

    pub async fn scan_until_cancelled(
        &self,
        email: &str,
        selected: &[String],
        cancel: CancellationToken,
    ) -> Result<ScanOutcome> {
        tracing::info!("🔍 Starting scan for: {}", email);

        let resolution = self.registry.resolve(selected, &self.client);
        let results = self
            .engine
            .run_until_cancelled(email, resolution.probes, cancel)
            .await?;

        Ok(ScanOutcome {
            results,
            skipped: resolution.unknown,
        })
    }
}
