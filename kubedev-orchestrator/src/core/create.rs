use chrono::{Duration as ChronoDuration, Utc};
use kubedev_types::{
    DeclaredResources, EnvironmentRecord, EnvironmentState, KubeDevEnvironment, Principal,
    ProgressEvent, ProgressStage,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::custom_object::CrCreateResult;
use crate::normalize::{self, generate_access_code};

use super::Orchestrator;

const ACCESS_CODE_LENGTH: usize = 5;
/// Bounded so a slow/abandoned subscriber can't make the background task
/// buffer unboundedly; the stream never emits more than a handful of
/// stages plus heartbeats (§4.5).
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Builds the `Pending` row a `Create` writes before touching the cluster
/// (§4.4 step 2). The CR is the source of truth for every declared field;
/// the record is an audit snapshot of it (§3).
fn build_pending_record(
    orch: &Orchestrator,
    principal: &Principal,
    cr: &KubeDevEnvironment,
    template_id: String,
) -> EnvironmentRecord {
    let name = cr.metadata.name.clone().unwrap_or_default();
    let namespace = cr
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| orch.cluster.cr_namespace.clone());
    let now = Utc::now();
    EnvironmentRecord {
        id: Uuid::new_v4(),
        owner_id: principal.id,
        template_id,
        display_name: principal.name.clone(),
        sanitized_name: cr.spec.user_name.clone(),
        cr_name: name.clone(),
        cr_namespace: namespace,
        workload_name: name,
        state: EnvironmentState::Pending,
        state_message: None,
        access_url: None,
        access_code: generate_access_code(ACCESS_CODE_LENGTH),
        declared_git: cr.spec.git_repository.clone(),
        declared_ports: cr.spec.ports.clone(),
        declared_env: cr.spec.env.clone(),
        declared_resources: DeclaredResources {
            cpu: orch.cluster.default_cpu.clone(),
            memory: orch.cluster.default_memory.clone(),
            storage: cr.spec.storage.size.clone(),
        },
        created_at: now,
        started_at: None,
        stopped_at: None,
        last_access_at: None,
        expires_at: now + ChronoDuration::hours(orch.cluster.environment_timeout_hours),
        version: 0,
    }
}

/// Outcome of [`provision`]. `Conflict` is kept distinct from `Failed`
/// because the two tie-break differently: a conflict means a record for
/// this `cr_name` already exists elsewhere and this attempt must leave no
/// trace (§4.4 "tie-breaks and edge cases", §8 scenario 2), while a
/// transport failure leaves the just-created `Pending` record behind as
/// `Error` for the operator to inspect and retry (§7).
enum ProvisionError {
    Conflict,
    Failed(String),
}

/// Submits the CR to the cluster, ensuring its namespace and quota first
/// (§4.4 steps 3-4).
async fn provision(
    orch: &Orchestrator,
    record: &EnvironmentRecord,
    cr: &KubeDevEnvironment,
) -> std::result::Result<(), ProvisionError> {
    orch.gateway
        .ensure_namespace(&record.cr_namespace)
        .await
        .into_result()
        .map_err(|e| ProvisionError::Failed(e.to_string()))?;

    orch.gateway
        .ensure_resource_quota(
            &record.cr_namespace,
            &super::quota_name(&record.cr_namespace),
            &record.declared_resources.cpu,
            &record.declared_resources.memory,
            &record.declared_resources.storage,
        )
        .await
        .into_result()
        .map_err(|e| ProvisionError::Failed(e.to_string()))?;

    match orch.gateway.create_custom_object(&record.cr_namespace, cr).await {
        CrCreateResult::Created(_) => Ok(()),
        CrCreateResult::AlreadyExists => Err(ProvisionError::Conflict),
        CrCreateResult::Unavailable(reason) => Err(ProvisionError::Failed(reason)),
    }
}

/// `Create` (synchronous variant, §4.4). Normalizes the manifest, writes a
/// `Pending` record, submits the CR, and hands the record off to the
/// Status Reconciler (F) in the background.
pub async fn create(
    orch: &Orchestrator,
    principal: Principal,
    manifest: &[u8],
    template_id: String,
) -> Result<EnvironmentRecord> {
    let cr = normalize::normalize_manifest(manifest, &principal, &orch.cluster.cr_namespace)?;
    let pending = build_pending_record(orch, &principal, &cr, template_id);
    let record = orch.store.create(pending).await?;
    let _guard = orch.locks.lock(record.id).await;

    match provision(orch, &record, &cr).await {
        Ok(()) => {
            let record = orch
                .store
                .update(record.id, |r| {
                    r.state = EnvironmentState::Creating;
                    r.state_message = Some("custom object submitted".to_string());
                    Ok(())
                })
                .await?;
            crate::reconcile::spawn(orch.clone(), record.id);
            Ok(record)
        }
        Err(ProvisionError::Conflict) => {
            orch.store.delete(record.id).await?;
            Err(Error::Conflict(format!(
                "an environment named {} already exists",
                record.cr_name
            )))
        }
        Err(ProvisionError::Failed(reason)) => {
            orch.store
                .update(record.id, move |r| {
                    r.state = EnvironmentState::Error;
                    r.state_message = Some(reason.clone());
                    Ok(())
                })
                .await
        }
    }
}

/// `CreateStream` (§4.4/§4.5). Spawns the whole operation onto a
/// background task and returns a bounded channel of `ProgressEvent`s; the
/// task keeps driving the reconciliation even if the receiver is dropped.
pub fn create_stream(
    orch: Orchestrator,
    principal: Principal,
    manifest: Vec<u8>,
    template_id: String,
) -> mpsc::Receiver<ProgressEvent> {
    let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        run_create_stream(orch, principal, manifest, template_id, tx).await;
    });
    rx
}

async fn send(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) -> bool {
    tx.send(event).await.is_ok()
}

async fn run_create_stream(
    orch: Orchestrator,
    principal: Principal,
    manifest: Vec<u8>,
    template_id: String,
    tx: mpsc::Sender<ProgressEvent>,
) {
    if !send(
        &tx,
        ProgressEvent::new(ProgressStage::UserCreated, "principal verified"),
    )
    .await
    {
        return;
    }

    let cr = match normalize::normalize_manifest(&manifest, &principal, &orch.cluster.cr_namespace)
    {
        Ok(cr) => cr,
        Err(e) => {
            let _ = tx
                .send(ProgressEvent::new(ProgressStage::Error, e.to_string()))
                .await;
            return;
        }
    };

    if !send(
        &tx,
        ProgressEvent::new(
            ProgressStage::TemplateLoaded,
            format!("template {template_id} resolved"),
        ),
    )
    .await
    {
        return;
    }

    let pending = build_pending_record(&orch, &principal, &cr, template_id);
    let record = match orch.store.create(pending).await {
        Ok(r) => r,
        Err(e) => {
            let _ = tx
                .send(ProgressEvent::new(ProgressStage::Error, e.to_string()))
                .await;
            return;
        }
    };
    let _guard = orch.locks.lock(record.id).await;

    match provision(&orch, &record, &cr).await {
        Ok(()) => {}
        Err(ProvisionError::Conflict) => {
            let _ = orch.store.delete(record.id).await;
            let _ = tx
                .send(ProgressEvent::new(
                    ProgressStage::Error,
                    format!("an environment named {} already exists", record.cr_name),
                ))
                .await;
            return;
        }
        Err(ProvisionError::Failed(reason)) => {
            let _ = orch
                .store
                .update(record.id, move |r| {
                    r.state = EnvironmentState::Error;
                    r.state_message = Some(reason.clone());
                    Ok(())
                })
                .await;
            let _ = tx
                .send(ProgressEvent::new(ProgressStage::Error, "cluster unavailable"))
                .await;
            return;
        }
    }

    if !send(
        &tx,
        ProgressEvent::new(ProgressStage::CrdSubmitted, "custom object submitted"),
    )
    .await
    {
        // Subscriber is gone; the reconciler still needs to run.
        let record = match orch
            .store
            .update(record.id, |r| {
                r.state = EnvironmentState::Creating;
                Ok(())
            })
            .await
        {
            Ok(r) => r,
            Err(_) => return,
        };
        crate::reconcile::spawn(orch, record.id);
        return;
    }

    let record = match orch
        .store
        .update(record.id, |r| {
            r.state = EnvironmentState::Creating;
            Ok(())
        })
        .await
    {
        Ok(r) => r,
        Err(e) => {
            let _ = tx
                .send(ProgressEvent::new(ProgressStage::Error, e.to_string()))
                .await;
            return;
        }
    };

    crate::stream::drive_inline_wait(&orch, record, tx).await;
}
