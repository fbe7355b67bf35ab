use std::time::Duration;

use crate::core::Orchestrator;

/// Expiry sweep (§4.4 "Expiry": `Running`/`Stopped` with `now >=
/// expires_at` transitions to `Expired`). Detached background task,
/// independent of any single record's lock, since a bulk sweep touches
/// rows no in-flight request holds.
pub fn spawn(orch: Orchestrator) {
    tokio::spawn(async move {
        run(orch).await;
    });
}

async fn run(orch: Orchestrator) {
    let interval = Duration::from_secs(orch.expiry.expiry_sweep_interval_secs.max(1));
    loop {
        match orch.store.expire_due().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "swept expired environments"),
            Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
