use kube::Api;
use kube::api::{DeleteParams, PostParams};
use kubedev_types::KubeDevEnvironment;

use super::{ClusterGateway, GatewayResult};

/// Outcome of submitting a new CR. Unlike every other `ensure_*`/`create_*`
/// call, `AlreadyExists` is never folded into `Ok` here: a second `Create`
/// landing on the same derived `cr_name` is the duplicate-environment
/// tie-break in §4.4, and the Orchestrator needs to tell it apart from a
/// transport failure to map it onto `Error::Conflict` instead of
/// `ClusterUnavailable`.
pub enum CrCreateResult {
    Created(KubeDevEnvironment),
    AlreadyExists,
    Unavailable(String),
}

impl ClusterGateway {
    pub async fn create_custom_object(
        &self,
        namespace: &str,
        cr: &KubeDevEnvironment,
    ) -> CrCreateResult {
        let api: Api<KubeDevEnvironment> = Api::namespaced(self.client(), namespace);
        match tokio::time::timeout(
            self.write_timeout(),
            api.create(&PostParams::default(), cr),
        )
        .await
        {
            Ok(Ok(created)) => CrCreateResult::Created(created),
            Ok(Err(kube::Error::Api(api_err))) if api_err.code == 409 => {
                CrCreateResult::AlreadyExists
            }
            Ok(Err(err)) => CrCreateResult::Unavailable(super::describe_kube_error(&err)),
            Err(_) => {
                CrCreateResult::Unavailable("timed out waiting for cluster response".into())
            }
        }
    }

    pub async fn get_custom_object(
        &self,
        namespace: &str,
        name: &str,
    ) -> GatewayResult<KubeDevEnvironment> {
        let api: Api<KubeDevEnvironment> = Api::namespaced(self.client(), namespace);
        self.with_read_timeout(api.get(name)).await
    }

    pub async fn delete_custom_object(&self, namespace: &str, name: &str) -> GatewayResult<()> {
        let api: Api<KubeDevEnvironment> = Api::namespaced(self.client(), namespace);
        match self
            .with_write_timeout(api.delete(name, &DeleteParams::default()))
            .await
        {
            GatewayResult::NotFound => GatewayResult::Ok(()),
            other => other.map(|_| ()),
        }
    }
}
