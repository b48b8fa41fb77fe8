//! Long-lived service lifecycle.
//!
//! Services (the runner, the executor, the event API) share a three-phase
//! lifecycle:
//!
//! 1. `pre`: acquire collaborators and validate configuration
//! 2. `run`: block doing the service's work until cancelled
//! 3. `stop`: release resources, bounded by the cancellation token
//!
//! Any `pre` failure aborts startup before `run` begins.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long `stop` may take before its deadline token fires.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Boxed error type used at service boundaries, where concrete error types
/// from multiple crates meet.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A long-lived service with a pre/run/stop lifecycle.
#[async_trait]
pub trait Service: Send {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Acquires collaborators and validates configuration.
    async fn pre(&mut self) -> Result<(), BoxError>;

    /// Performs the service's work, blocking until `cancel` fires.
    async fn run(&mut self, cancel: CancellationToken) -> Result<(), BoxError>;

    /// Releases resources. `cancel` bounds how long shutdown may take.
    async fn stop(&mut self, cancel: CancellationToken) -> Result<(), BoxError>;
}

/// Runs a single service through its full lifecycle.
///
/// `run` executes until the provided token is cancelled, after which `stop`
/// gets a fresh deadline token that fires after a grace period.
///
/// # Errors
///
/// Returns the first error from `pre`, `run`, or `stop`.
pub async fn start(mut svc: impl Service, cancel: CancellationToken) -> Result<(), BoxError> {
    tracing::info!(service = svc.name(), "starting service");
    svc.pre().await?;

    let result = svc.run(cancel).await;

    tracing::info!(service = svc.name(), "stopping service");
    let deadline = CancellationToken::new();
    {
        let deadline = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STOP_GRACE).await;
            deadline.cancel();
        });
    }
    svc.stop(deadline).await?;
    result
}
