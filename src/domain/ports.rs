use crate::domain::model::ProbeResult;
use async_trait::async_trait;

/// One account-existence check against one external service.
///
/// Implementations never return errors: anything that goes wrong while
/// talking to the service or reading its answer ends up in the returned
/// [`ProbeResult`].
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, email: &str) -> ProbeResult;
}
