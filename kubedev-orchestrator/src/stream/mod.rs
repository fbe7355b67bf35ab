use std::time::{Duration, Instant};

use kubedev_types::{EnvironmentRecord, EnvironmentState, ProgressEvent, ProgressPayload, ProgressStage};
use tokio::sync::mpsc;

use crate::core::Orchestrator;
use crate::gateway::GatewayResult;

/// Progress Stream (component E, §4.5). Drives the inline, bounded wait
/// for `pod_running` that a streaming `Create` performs after the CR has
/// been submitted, emitting heartbeats on a fixed cadence and handing the
/// record to the Status Reconciler (F) the moment the inline budget is
/// exhausted or the terminal event has been sent.
///
/// A dead subscriber (closed channel) never stops the reconciliation
/// itself: the loop always finishes by either resolving `Running`/`Error`
/// inline or spawning F before returning.
pub async fn drive_inline_wait(
    orch: &Orchestrator,
    record: EnvironmentRecord,
    tx: mpsc::Sender<ProgressEvent>,
) {
    let poll_interval = Duration::from_secs(orch.stream.stream_poll_interval_secs.max(1));
    let budget = Duration::from_secs(orch.stream.stream_max_wait_secs);
    let heartbeat_every = orch.stream.stream_heartbeat_every.max(1);
    let deadline = Instant::now() + budget;

    let mut poll_count: u64 = 0;
    let mut announced_pending = false;
    let mut announced_running = false;

    loop {
        match orch
            .gateway
            .get_deployment_status(&record.cr_namespace, &record.workload_name)
            .await
        {
            GatewayResult::Ok(status) if status.ready_replicas >= 1 => {
                if !announced_running {
                    announced_running = true;
                    // A dead subscriber here is not fatal, same as the
                    // `PodPending` announcement below.
                    let _ = tx
                        .send(ProgressEvent::new(ProgressStage::PodRunning, "pod is running"))
                        .await;
                }
                if let Some(access_url) = resolve_access_url(orch, &record).await {
                    match orch
                        .store
                        .update(record.id, {
                            let access_url = access_url.clone();
                            move |r| {
                                r.state = EnvironmentState::Running;
                                r.state_message = Some("deployment ready".to_string());
                                r.access_url = Some(access_url.clone());
                                r.started_at = Some(chrono::Utc::now());
                                Ok(())
                            }
                        })
                        .await
                    {
                        Ok(updated) => {
                            orch.webhook
                                .notify(&format!(
                                    "environment {} is running at {}",
                                    updated.cr_name, access_url
                                ))
                                .await;
                            let _ = tx
                                .send(ProgressEvent::terminal(
                                    ProgressStage::Completed,
                                    "environment is ready",
                                    ProgressPayload {
                                        environment_id: updated.id,
                                        access_url: Some(access_url),
                                        access_code: updated.access_code.clone(),
                                    },
                                ))
                                .await;
                        }
                        Err(e) => {
                            let _ = tx
                                .send(ProgressEvent::new(ProgressStage::Error, e.to_string()))
                                .await;
                        }
                    }
                    return;
                }
            }
            GatewayResult::Ok(_) | GatewayResult::NotFound => {
                if !announced_pending {
                    announced_pending = true;
                    // A dead subscriber here is not fatal: polling keeps
                    // going silently until the budget expires or the
                    // deployment becomes ready, then falls through to F.
                    let _ = tx
                        .send(ProgressEvent::new(
                            ProgressStage::PodPending,
                            "waiting for the pod to become ready",
                        ))
                        .await;
                }
            }
            GatewayResult::Unavailable(_) => {}
        }

        if Instant::now() >= deadline {
            let _ = tx
                .send(ProgressEvent::terminal(
                    ProgressStage::Timeout,
                    "timed out waiting for the pod to become ready",
                    ProgressPayload {
                        environment_id: record.id,
                        access_url: None,
                        access_code: record.access_code.clone(),
                    },
                ))
                .await;
            crate::reconcile::spawn(orch.clone(), record.id);
            return;
        }

        poll_count += 1;
        if poll_count % heartbeat_every == 0 {
            let _ = tx
                .send(ProgressEvent::new(
                    ProgressStage::PodPending,
                    "still provisioning",
                ))
                .await;
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Resolves the record's access URL the way F also does (§4.6): the CR's
/// `status.ideUrl` is authoritative when present, otherwise fall back to a
/// Service-derived URL.
async fn resolve_access_url(orch: &Orchestrator, record: &EnvironmentRecord) -> Option<String> {
    match orch
        .gateway
        .get_custom_object(&record.cr_namespace, &record.cr_name)
        .await
    {
        GatewayResult::Ok(cr) => {
            if let Some(url) = cr.status.and_then(|s| s.ide_url) {
                return Some(url);
            }
        }
        GatewayResult::NotFound | GatewayResult::Unavailable(_) => {}
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
