use std::time::Duration;

use chrono::Utc;
use kubedev_types::{AccessInfo, EnvironmentRecord, EnvironmentState, Principal};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::GatewayResult;

use super::Orchestrator;

/// Grace period `Restart` waits between scaling to zero and back to one
/// (§4.4).
const RESTART_GRACE_PERIOD: Duration = Duration::from_secs(5);

fn authorize(principal: &Principal, record: &EnvironmentRecord) -> Result<()> {
    if principal.owns(record.owner_id) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

pub async fn get(orch: &Orchestrator, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;
    Ok(record)
}

/// `List` (§6). Non-administrators are always scoped to their own
/// environments regardless of what `owner_filter` they pass.
pub async fn list(
    orch: &Orchestrator,
    principal: Principal,
    owner_filter: Option<Uuid>,
    state_filter: Option<EnvironmentState>,
    limit: i64,
    offset: i64,
) -> Result<Vec<EnvironmentRecord>> {
    let effective_owner = if principal.is_admin {
        owner_filter
    } else {
        Some(principal.id)
    };
    orch.store
        .list(effective_owner, state_filter, limit, offset)
        .await
}

/// `Start` (§4.4). A concurrent `Start` on an already-`Running` record is
/// a no-op that returns the current view.
pub async fn start(orch: &Orchestrator, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
    let _guard = orch.locks.lock(id).await;
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;

    if record.state == EnvironmentState::Running {
        return Ok(record);
    }
    // `Creating` here means another `Start`/`Create` already won the race
    // for this id and advanced it past `Stopped` while this call waited on
    // the per-record lock — the "concurrent update lost the race" case
    // §7 defines `Conflict` for, not an invalid-state error (§8 property 5:
    // losers see `Conflict` or a no-op `Running` response, never anything
    // else).
    if record.state == EnvironmentState::Creating {
        return Err(Error::Conflict(format!(
            "environment {id} is already being started"
        )));
    }
    if record.state != EnvironmentState::Stopped {
        return Err(Error::PreconditionFailed(format!(
            "cannot start an environment in state {}",
            record.state
        )));
    }

    orch.gateway
        .scale_deployment(&record.cr_namespace, &record.workload_name, 1)
        .await
        .into_result()?;

    let updated = orch
        .store
        .update(id, |r| {
            r.state = EnvironmentState::Creating;
            r.state_message = Some("scaled up".to_string());
            Ok(())
        })
        .await?;
    crate::reconcile::spawn(orch.clone(), id);
    Ok(updated)
}

/// `Stop` (§4.4). Idempotent: `Stop` on an already-`Stopped` record
/// returns the current view without issuing a cluster call.
pub async fn stop(orch: &Orchestrator, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
    let _guard = orch.locks.lock(id).await;
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;

    if record.state == EnvironmentState::Stopped {
        return Ok(record);
    }
    // `Stopping` is re-entered here too: a prior `Stop` call may have
    // written it and then failed to reach the cluster before
    // `scale_deployment` returned, leaving nothing to retry from but
    // `Stopping` itself.
    if record.state != EnvironmentState::Running && record.state != EnvironmentState::Stopping {
        return Err(Error::PreconditionFailed(format!(
            "cannot stop an environment in state {}",
            record.state
        )));
    }

    orch.store
        .update(id, |r| {
            r.state = EnvironmentState::Stopping;
            r.state_message = Some("scaling down".to_string());
            Ok(())
        })
        .await?;

    let state_message = match orch
        .gateway
        .scale_deployment(&record.cr_namespace, &record.workload_name, 0)
        .await
    {
        GatewayResult::Ok(()) => "scaled down".to_string(),
        GatewayResult::NotFound => "workload already reclaimed by the cluster".to_string(),
        GatewayResult::Unavailable(reason) => return Err(Error::ClusterUnavailable(reason)),
    };

    let updated = orch
        .store
        .update(id, move |r| {
            r.state = EnvironmentState::Stopped;
            r.state_message = Some(state_message.clone());
            r.stopped_at = Some(Utc::now());
            Ok(())
        })
        .await?;

    orch.webhook
        .notify(&format!("environment {} is stopped", updated.cr_name))
        .await;
    Ok(updated)
}

/// `Restart` (§4.4): scale to zero, wait out a grace period, scale back to
/// one. A failure on the second scale call is folded into the record as
/// `Error` rather than thrown, matching `Create`'s propagation policy for
/// failures observed after an external mutation has already landed.
pub async fn restart(
    orch: &Orchestrator,
    principal: Principal,
    id: Uuid,
) -> Result<EnvironmentRecord> {
    let _guard = orch.locks.lock(id).await;
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;

    if record.state != EnvironmentState::Running {
        return Err(Error::PreconditionFailed(format!(
            "cannot restart an environment in state {}",
            record.state
        )));
    }

    orch.gateway
        .scale_deployment(&record.cr_namespace, &record.workload_name, 0)
        .await
        .into_result()?;

    let record = orch
        .store
        .update(id, |r| {
            r.state = EnvironmentState::Creating;
            r.state_message = Some("restarting".to_string());
            Ok(())
        })
        .await?;

    tokio::time::sleep(RESTART_GRACE_PERIOD).await;

    match orch
        .gateway
        .scale_deployment(&record.cr_namespace, &record.workload_name, 1)
        .await
    {
        GatewayResult::Ok(()) => {
            crate::reconcile::spawn(orch.clone(), id);
            Ok(record)
        }
        GatewayResult::NotFound | GatewayResult::Unavailable(_) => {
            orch.store
                .update(id, |r| {
                    r.state = EnvironmentState::Error;
                    r.state_message = Some("failed to scale back up during restart".to_string());
                    Ok(())
                })
                .await
        }
    }
}

/// `Delete` (§4.4, resolved per §9: the CR namespace is shared across
/// tenants, so only the CR and the objects this orchestrator created by
/// name are removed — never the namespace itself).
pub async fn delete(orch: &Orchestrator, principal: Principal, id: Uuid) -> Result<()> {
    let _guard = orch.locks.lock(id).await;
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;

    orch.gateway
        .delete_deployment(&record.cr_namespace, &record.workload_name)
        .await
        .into_result()?;
    orch.gateway
        .delete_service(&record.cr_namespace, &record.workload_name)
        .await
        .into_result()?;
    orch.gateway
        .delete_ingress(&record.cr_namespace, &record.workload_name)
        .await
        .into_result()?;
    orch.gateway
        .delete_custom_object(&record.cr_namespace, &record.cr_name)
        .await
        .into_result()?;
    // The ResourceQuota is keyed by namespace, not by environment (§9: the
    // CR namespace is shared across tenants), so it outlives any single
    // environment's delete — removing it here would drop quota enforcement
    // for every other environment still in `cr_namespace`.

    orch.webhook
        .notify(&format!("environment {} deleted", record.cr_name))
        .await;
    orch.store.delete(id).await
}

pub async fn get_logs(
    orch: &Orchestrator,
    principal: Principal,
    id: Uuid,
    tail: i64,
) -> Result<Vec<String>> {
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;
    orch.gateway
        .get_pod_logs(&record.cr_namespace, &record.workload_name, tail)
        .await
        .into_result()
}

pub async fn get_access_info(
    orch: &Orchestrator,
    principal: Principal,
    id: Uuid,
) -> Result<AccessInfo> {
    let record = orch.store.get(id).await?;
    authorize(&principal, &record)?;
    Ok(AccessInfo {
        access_url: record.access_url,
        state: record.state,
        ports: record.declared_ports,
    })
}
