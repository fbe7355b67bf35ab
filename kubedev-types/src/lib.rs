use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use uuid::Uuid;

/// Commands run inside the IDE container: `init` once on first boot, `start`
/// every time the container comes up.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct EnvironmentCommands {
    pub init: Option<String>,
    pub start: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct EnvironmentStorage {
    #[serde(default = "default_storage_size")]
    pub size: String,
}

impl Default for EnvironmentStorage {
    fn default() -> Self {
        Self {
            size: default_storage_size(),
        }
    }
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![8080]
}

/// The declarative manifest an operator submits, after normalization.
///
/// `user_name` and `metadata.name` are always overwritten by the Spec
/// Normalizer before this is submitted to the cluster; the fields exist here
/// so round-tripping a submitted manifest reflects what was actually created.
#[derive(
    CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema,
)]
#[kube(
    group = "kubedev.my-project.com",
    version = "v1alpha1",
    kind = "KubeDevEnvironment",
    plural = "kubedevenvironments",
    derive = "PartialEq",
    status = "KubeDevEnvironmentStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
#[kube(printcolumn = "{\"jsonPath\": \".status.ideUrl\", \"name\": \"URL\", \"type\": \"string\" }")]
pub struct EnvironmentSpec {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "gitRepository", default)]
    pub git_repository: Option<String>,
    pub image: String,
    #[serde(default)]
    pub commands: EnvironmentCommands,
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub storage: EnvironmentStorage,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, JsonSchema, Default)]
pub enum EnvironmentPhase {
    #[default]
    Provisioning,
    Running,
    Failed,
}

impl fmt::Display for EnvironmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentPhase::Provisioning => write!(f, "Provisioning"),
            EnvironmentPhase::Running => write!(f, "Running"),
            EnvironmentPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct KubeDevEnvironmentStatus {
    pub phase: EnvironmentPhase,
    pub namespace: Option<String>,
    #[serde(rename = "ideUrl")]
    pub ide_url: Option<String>,
    pub message: Option<String>,
}

/// Lifecycle state of an [`EnvironmentRecord`]. There is no `Deleted`
/// variant: a deleted environment's row is removed from the store, not
/// transitioned (invariant 3).
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    Pending,
    Creating,
    Running,
    Stopping,
    Stopped,
    Error,
    Expired,
}

impl fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvironmentState::Pending => "pending",
            EnvironmentState::Creating => "creating",
            EnvironmentState::Running => "running",
            EnvironmentState::Stopping => "stopping",
            EnvironmentState::Stopped => "stopped",
            EnvironmentState::Error => "error",
            EnvironmentState::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EnvironmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnvironmentState::Pending),
            "creating" => Ok(EnvironmentState::Creating),
            "running" => Ok(EnvironmentState::Running),
            "stopping" => Ok(EnvironmentState::Stopping),
            "stopped" => Ok(EnvironmentState::Stopped),
            "error" => Ok(EnvironmentState::Error),
            "expired" => Ok(EnvironmentState::Expired),
            other => Err(format!("unknown environment state: {other}")),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct DeclaredResources {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
}

/// Durable row describing one environment's declared spec and lifecycle
/// state (component B, §3).
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EnvironmentRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub template_id: String,
    pub display_name: String,
    pub sanitized_name: String,
    pub cr_name: String,
    pub cr_namespace: String,
    pub workload_name: String,
    pub state: EnvironmentState,
    pub state_message: Option<String>,
    pub access_url: Option<String>,
    pub declared_git: Option<String>,
    pub declared_ports: Vec<u16>,
    pub declared_env: BTreeMap<String, String>,
    pub declared_resources: DeclaredResources,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    /// Short human-facing code surfaced alongside the access URL (the
    /// IDE's connection password). Generated once at creation and never
    /// rotated by the orchestrator.
    pub access_code: String,
    /// Monotonic row version, used for optimistic-concurrency detection in
    /// the Record Store.
    pub version: i32,
}

/// `{access_url, state, ports}` returned by `GetAccessInfo` (§6).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AccessInfo {
    pub access_url: Option<String>,
    pub state: EnvironmentState,
    pub ports: Vec<u16>,
}

/// A single stage of a streaming `Create` (component E, §4.5).
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    UserCreated,
    TemplateLoaded,
    CrdSubmitted,
    PodPending,
    PodRunning,
    Completed,
    Timeout,
    Error,
}

impl ProgressStage {
    /// The stages that end a Progress Stream.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProgressStage::Completed | ProgressStage::Timeout | ProgressStage::Error
        )
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ProgressPayload {
    pub environment_id: Uuid,
    pub access_url: Option<String>,
    pub access_code: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    #[serde(rename = "status")]
    pub stage: ProgressStage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ProgressPayload>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            payload: None,
        }
    }

    pub fn terminal(stage: ProgressStage, message: impl Into<String>, payload: ProgressPayload) -> Self {
        Self {
            stage,
            message: message.into(),
            payload: Some(payload),
        }
    }
}

/// The authenticated identity an inbound call carries. The orchestrator
/// trusts this; it never derives it. `name` is a caller-facing display
/// name, trusted the same way as `id`/`is_admin`; it is never used for
/// authorization, only for deriving `spec.userName` (see
/// `normalize::normalize_manifest`).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.id == owner_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_stage_terminal_states() {
        assert!(!ProgressStage::UserCreated.is_terminal());
        assert!(!ProgressStage::TemplateLoaded.is_terminal());
        assert!(!ProgressStage::CrdSubmitted.is_terminal());
        assert!(!ProgressStage::PodPending.is_terminal());
        assert!(!ProgressStage::PodRunning.is_terminal());
        assert!(ProgressStage::Completed.is_terminal());
        assert!(ProgressStage::Timeout.is_terminal());
        assert!(ProgressStage::Error.is_terminal());
    }

    #[test]
    fn principal_owns_self() {
        let id = Uuid::new_v4();
        let p = Principal { id, name: "Alice".to_string(), is_admin: false };
        assert!(p.owns(id));
    }

    #[test]
    fn principal_does_not_own_others() {
        let p = Principal { id: Uuid::new_v4(), name: "Alice".to_string(), is_admin: false };
        assert!(!p.owns(Uuid::new_v4()));
    }

    #[test]
    fn admin_owns_everything() {
        let p = Principal { id: Uuid::new_v4(), name: "Admin".to_string(), is_admin: true };
        assert!(p.owns(Uuid::new_v4()));
    }

    #[test]
    fn environment_state_round_trips_through_display_and_from_str() {
        use std::str::FromStr;
        for s in [
            EnvironmentState::Pending,
            EnvironmentState::Creating,
            EnvironmentState::Running,
            EnvironmentState::Stopping,
            EnvironmentState::Stopped,
            EnvironmentState::Error,
            EnvironmentState::Expired,
        ] {
            let parsed = EnvironmentState::from_str(&s.to_string()).unwrap();
            assert_eq!(parsed, s);
        }
        assert!(EnvironmentState::from_str("bogus").is_err());
    }
}
