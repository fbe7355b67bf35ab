pub mod create;
pub mod lifecycle;
mod locks;

use kubedev_common::args::{ClusterArgs, ExpiryArgs, ReconcilerArgs, StreamArgs};
use kubedev_common::webhook::NotificationHook;
use kubedev_types::{
    AccessInfo, EnvironmentRecord, EnvironmentState, Principal, ProgressEvent,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::ClusterGateway;
use crate::store::EnvironmentStore;
use locks::RecordLockRegistry;

/// The state machine and top-level sequencer (component D, §4.4). Holds
/// every collaborator a lifecycle operation needs; cheap to clone, shared
/// across request tasks and background reconcilers alike.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) gateway: ClusterGateway,
    pub(crate) store: EnvironmentStore,
    pub(crate) webhook: NotificationHook,
    pub(crate) cluster: ClusterArgs,
    pub(crate) reconciler: ReconcilerArgs,
    pub(crate) stream: StreamArgs,
    pub(crate) expiry: ExpiryArgs,
    pub(crate) locks: RecordLockRegistry,
}

impl Orchestrator {
    pub fn new(
        gateway: ClusterGateway,
        store: EnvironmentStore,
        webhook: NotificationHook,
        cluster: ClusterArgs,
        reconciler: ReconcilerArgs,
        stream: StreamArgs,
        expiry: ExpiryArgs,
    ) -> Self {
        Self {
            gateway,
            store,
            webhook,
            cluster,
            reconciler,
            stream,
            expiry,
            locks: RecordLockRegistry::new(),
        }
    }

    /// `Create` (synchronous variant, §4.4). See [`create::create`].
    pub async fn create(
        &self,
        principal: Principal,
        manifest: &[u8],
        template_id: String,
    ) -> Result<EnvironmentRecord> {
        create::create(self, principal, manifest, template_id).await
    }

    /// `CreateStream` (§4.4/§4.5). See [`create::create_stream`].
    pub fn create_stream(
        &self,
        principal: Principal,
        manifest: Vec<u8>,
        template_id: String,
    ) -> mpsc::Receiver<ProgressEvent> {
        create::create_stream(self.clone(), principal, manifest, template_id)
    }

    pub async fn get(&self, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
        lifecycle::get(self, principal, id).await
    }

    pub async fn list(
        &self,
        principal: Principal,
        owner_filter: Option<Uuid>,
        state_filter: Option<EnvironmentState>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EnvironmentRecord>> {
        lifecycle::list(self, principal, owner_filter, state_filter, limit, offset).await
    }

    pub async fn start(&self, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
        lifecycle::start(self, principal, id).await
    }

    pub async fn stop(&self, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
        lifecycle::stop(self, principal, id).await
    }

    pub async fn restart(&self, principal: Principal, id: Uuid) -> Result<EnvironmentRecord> {
        lifecycle::restart(self, principal, id).await
    }

    pub async fn delete(&self, principal: Principal, id: Uuid) -> Result<()> {
        lifecycle::delete(self, principal, id).await
    }

    pub async fn get_logs(
        &self,
        principal: Principal,
        id: Uuid,
        tail: i64,
    ) -> Result<Vec<String>> {
        lifecycle::get_logs(self, principal, id, tail).await
    }

    pub async fn get_access_info(&self, principal: Principal, id: Uuid) -> Result<AccessInfo> {
        lifecycle::get_access_info(self, principal, id).await
    }
}

/// Name of the `ResourceQuota` this orchestrator ensures/deletes alongside
/// a CR's namespace. One quota per CR namespace, not per environment: the
/// namespace is shared across tenants (§9).
pub(crate) fn quota_name(cr_namespace: &str) -> String {
    format!("{cr_namespace}-quota")
}
