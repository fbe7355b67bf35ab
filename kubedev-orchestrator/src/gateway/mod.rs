pub mod custom_object;
pub mod observability;
pub mod workload;

use kube::Client;

/// The Cluster Gateway's three-valued result, mirroring the contract in
/// §4.1: a semantic "the object wasn't there" is distinct from "we
/// couldn't reach the cluster at all".
#[derive(Debug)]
pub enum GatewayResult<T> {
    Ok(T),
    NotFound,
    Unavailable(String),
}

impl<T> GatewayResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GatewayResult<U> {
        match self {
            GatewayResult::Ok(v) => GatewayResult::Ok(f(v)),
            GatewayResult::NotFound => GatewayResult::NotFound,
            GatewayResult::Unavailable(r) => GatewayResult::Unavailable(r),
        }
    }

    /// Lifts into the orchestrator-wide `Result`, treating `NotFound` as an
    /// error. Callers that want 404-tolerance (idempotent delete, etc.)
    /// should match on the variant directly instead.
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            GatewayResult::Ok(v) => Ok(v),
            GatewayResult::NotFound => Err(crate::error::Error::NotFound),
            GatewayResult::Unavailable(r) => Err(crate::error::Error::ClusterUnavailable(r)),
        }
    }
}

pub(crate) fn classify_kube_error<T>(err: kube::Error) -> GatewayResult<T> {
    match &err {
        kube::Error::Api(api_err) if api_err.code == 404 => GatewayResult::NotFound,
        _ => GatewayResult::Unavailable(describe_kube_error(&err)),
    }
}

/// `AlreadyExists` (409) maps to `Ok` for idempotent create operations
/// (§4.1): retrying a `Create` that has already landed must not surface an
/// error.
pub(crate) fn classify_idempotent_create(err: kube::Error) -> GatewayResult<()> {
    match &err {
        kube::Error::Api(api_err) if api_err.code == 409 => GatewayResult::Ok(()),
        kube::Error::Api(api_err) if api_err.code == 404 => GatewayResult::NotFound,
        _ => GatewayResult::Unavailable(describe_kube_error(&err)),
    }
}

/// Decodes the error body as UTF-8, falling back to Windows-1252 for
/// manifests/clusters that round-trip non-UTF-8 text through the API
/// server's error channel (§4.1, grounded in the original service's
/// UTF-8-then-legacy-encoding fallback).
pub(crate) fn describe_kube_error(err: &kube::Error) -> String {
    if let kube::Error::Api(api_err) = err {
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(api_err.message.as_bytes());
        format!("{} ({}): {}", api_err.reason, api_err.code, decoded)
    } else {
        err.to_string()
    }
}

/// Typed wrapper around the cluster API (component A). Cheap to clone;
/// wraps a single `kube::Client`.
#[derive(Clone)]
pub struct ClusterGateway {
    client: Client,
    read_timeout: std::time::Duration,
    write_timeout: std::time::Duration,
}

impl ClusterGateway {
    /// Builds a Gateway from the ambient kubeconfig or in-cluster config.
    /// Failure to construct a client at all is itself an `Unavailable`
    /// cluster, consistent with the rest of the Gateway's contract.
    pub async fn connect() -> GatewayResult<Self> {
        match Client::try_default().await {
            Ok(client) => GatewayResult::Ok(Self {
                client,
                read_timeout: std::time::Duration::from_secs(5),
                write_timeout: std::time::Duration::from_secs(30),
            }),
            Err(err) => GatewayResult::Unavailable(err.to_string()),
        }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub(crate) fn write_timeout(&self) -> std::time::Duration {
        self.write_timeout
    }

    pub(crate) async fn with_read_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, kube::Error>>,
    ) -> GatewayResult<T> {
        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(Ok(v)) => GatewayResult::Ok(v),
            Ok(Err(e)) => classify_kube_error(e),
            Err(_) => GatewayResult::Unavailable("timed out waiting for cluster response".into()),
        }
    }

    pub(crate) async fn with_write_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, kube::Error>>,
    ) -> GatewayResult<T> {
        match tokio::time::timeout(self.write_timeout, fut).await {
            Ok(Ok(v)) => GatewayResult::Ok(v),
            Ok(Err(e)) => classify_kube_error(e),
            Err(_) => GatewayResult::Unavailable("timed out waiting for cluster response".into()),
        }
    }

    /// Like [`Self::with_write_timeout`], but treats `AlreadyExists` as
    /// success instead of an error, for idempotent `ensure_*`/`create_*`
    /// calls.
    pub(crate) async fn with_idempotent_create<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, kube::Error>>,
    ) -> GatewayResult<()> {
        match tokio::time::timeout(self.write_timeout, fut).await {
            Ok(Ok(_)) => GatewayResult::Ok(()),
            Ok(Err(e)) => classify_idempotent_create(e),
            Err(_) => GatewayResult::Unavailable("timed out waiting for cluster response".into()),
        }
    }
}
