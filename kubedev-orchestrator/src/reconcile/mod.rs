use std::time::{Duration, Instant};

use kubedev_types::{EnvironmentPhase, EnvironmentState};
use uuid::Uuid;

use crate::core::Orchestrator;
use crate::gateway::GatewayResult;

/// Status Reconciler (component F, §4.6). Drives a single record from
/// `Creating` toward `Running` or `Error` by polling the CR and the
/// underlying Deployment; detached from whatever request spawned it.
pub fn spawn(orch: Orchestrator, record_id: Uuid) {
    tokio::spawn(async move {
        run(orch, record_id).await;
    });
}

async fn run(orch: Orchestrator, record_id: Uuid) {
    let poll_interval = Duration::from_secs(orch.reconciler.reconciler_poll_interval_secs.max(1));
    let max_wait = Duration::from_secs(orch.reconciler.reconciler_max_wait_secs);
    let deadline = Instant::now() + max_wait;

    loop {
        let record = match orch.store.get(record_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%record_id, error = %e, "reconciler could not load record, stopping");
                return;
            }
        };

        // The record moved on (stopped, deleted, restarted by a newer
        // reconciler) without our help; only one reconciler should be
        // driving a `Creating` record at a time (§9: the Reconciler is the
        // only component allowed to mutate observed-phase fields).
        if record.state != EnvironmentState::Creating {
            return;
        }

        let cr = match orch
            .gateway
            .get_custom_object(&record.cr_namespace, &record.cr_name)
            .await
        {
            GatewayResult::Ok(cr) => {
                if let Some(status) = &cr.status {
                    if status.phase == EnvironmentPhase::Failed {
                        let reason = status
                            .message
                            .clone()
                            .unwrap_or_else(|| "custom object reported Failed".to_string());
                        mark_error(&orch, record_id, &reason).await;
                        return;
                    }
                }
                Some(cr)
            }
            GatewayResult::NotFound => {
                mark_error(&orch, record_id, "custom object disappeared").await;
                return;
            }
            GatewayResult::Unavailable(_) => None,
        };

        match orch
            .gateway
            .get_deployment_status(&record.cr_namespace, &record.workload_name)
            .await
        {
            GatewayResult::Ok(status) if status.ready_replicas >= 1 => {
                let ide_url = cr.and_then(|cr| cr.status).and_then(|s| s.ide_url);
                if let Some(access_url) = resolve_access_url(&orch, &record, ide_url).await {
                    mark_running(&orch, record_id, access_url).await;
                    return;
                }
            }
            GatewayResult::Ok(_) | GatewayResult::NotFound | GatewayResult::Unavailable(_) => {}
        }

        if Instant::now() >= deadline {
            mark_error(&orch, record_id, "Deployment timeout").await;
            return;
        }

        tokio::time::sleep(poll_interval).await;
    }
}

async fn resolve_access_url(
    orch: &Orchestrator,
    record: &kubedev_types::EnvironmentRecord,
    ide_url: Option<String>,
) -> Option<String> {
    if let Some(url) = ide_url {
        return Some(url);
    }

    match orch
        .gateway
        .get_nodeport_url(
            &record.cr_namespace,
            &record.workload_name,
            &orch.cluster.platform_domain,
        )
        .await
    {
        GatewayResult::Ok(Some(url)) => Some(url),
        _ => None,
    }
}

async fn mark_running(orch: &Orchestrator, record_id: Uuid, access_url: String) {
    let updated = orch
        .store
        .update(record_id, {
            let access_url = access_url.clone();
            move |r| {
                r.state = EnvironmentState::Running;
                r.state_message = Some("deployment ready".to_string());
                r.access_url = Some(access_url.clone());
                r.started_at = Some(chrono::Utc::now());
                Ok(())
            }
        })
        .await;

    match updated {
        Ok(record) => {
            orch.webhook
                .notify(&format!(
                    "environment {} is running at {}",
                    record.cr_name, access_url
                ))
                .await;
        }
        Err(e) => {
            tracing::warn!(%record_id, error = %e, "failed to commit Running transition");
        }
    }
}

async fn mark_error(orch: &Orchestrator, record_id: Uuid, reason: &str) {
    let reason = reason.to_string();
    let result = orch
        .store
        .update(record_id, move |r| {
            r.state = EnvironmentState::Error;
            r.state_message = Some(reason.clone());
            Ok(())
        })
        .await;
    if let Err(e) = result {
        tracing::warn!(%record_id, error = %e, "failed to commit Error transition");
    }
}
