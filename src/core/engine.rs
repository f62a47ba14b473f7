use crate::domain::model::{ProbeError, ProbeResult, ResultSet};
use crate::domain::ports::Probe;
use crate::utils::error::{DigError, Result};
use crate::utils::validation::validate_positive_number;
use futures::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Runs probes concurrently and gathers one result per probe.
///
/// Each probe runs in its own task; at most `max_workers` of them hold a
/// worker permit at a time. A probe that panics or is cancelled still gets
/// an entry in the returned [`ResultSet`].
#[derive(Debug, Clone)]
pub struct ScanEngine {
    max_workers: usize,
}

impl ScanEngine {
    pub fn new(max_workers: usize) -> Result<Self> {
        validate_positive_number("max_workers", max_workers, 1)?;
        Ok(Self { max_workers })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub async fn run(
        &self,
        email: &str,
        probes: Vec<(String, Arc<dyn Probe>)>,
    ) -> Result<ResultSet> {
        self.run_until_cancelled(email, probes, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but stops early once `cancel` fires.
    ///
    /// Probes that have not finished by then are reported as
    /// `Scan cancelled`; the result set still has every submitted name.
    pub async fn run_until_cancelled(
        &self,
        email: &str,
        probes: Vec<(String, Arc<dyn Probe>)>,
        cancel: CancellationToken,
    ) -> Result<ResultSet> {
        if email.trim().is_empty() {
            return Err(DigError::InvalidInputError {
                message: "email address is empty".to_string(),
            });
        }

        let started = Instant::now();
        let email: Arc<str> = Arc::from(email);
        let permits = Arc::new(Semaphore::new(self.max_workers));
        let mut submitted = HashSet::new();
        let mut running = FuturesUnordered::new();
        let mut tasks = AbortOnDrop::default();

        tracing::info!(
            "🚀 Running {} probes with {} workers",
            probes.len(),
            self.max_workers
        );

        for (name, probe) in probes {
            if !submitted.insert(name.clone()) {
                tracing::warn!("Probe '{}' submitted twice, running it once", name);
                continue;
            }

            let handle = tokio::spawn(run_probe(
                name.clone(),
                probe,
                Arc::clone(&email),
                Arc::clone(&permits),
                cancel.clone(),
            ));
            tasks.0.push(handle.abort_handle());
            running.push(async move { (name, handle.await) });
        }

        let mut results = ResultSet::new();
        while let Some((name, joined)) = running.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::error!("Module {} failed: {}", name, message);
                    ProbeError::Internal(message).into()
                }
                Err(e) => {
                    tracing::warn!("Module {} did not finish: {}", name, e);
                    ProbeError::Cancelled.into()
                }
            };
            results.insert(name, result);
        }

        tracing::info!(
            "✅ Scan finished in {:?}: {} found, {} errors, {} total",
            started.elapsed(),
            results.found_count(),
            results.error_count(),
            results.len()
        );

        Ok(results)
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

async fn run_probe(
    name: String,
    probe: Arc<dyn Probe>,
    email: Arc<str>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> ProbeResult {
    let work = async {
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return ProbeError::Internal("worker pool closed".to_string()).into(),
        };

        tracing::debug!("▶️ {}: started", name);
        let started = Instant::now();
        let result = probe.check(&email).await;
        tracing::debug!(
            "⏹️ {}: found={:?} in {:?}",
            name,
            result.found(),
            started.elapsed()
        );
        result
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("Module {} cancelled", name);
            ProbeError::Cancelled.into()
        }
        result = work => result,
    }
}

/// Aborts the probe tasks if the scan future is dropped before they finish.
#[derive(Default)]
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("probe panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("probe panicked: {}", message)
    } else {
        "probe panicked".to_string()
    }
}
