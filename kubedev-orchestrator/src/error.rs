#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("manifest is malformed: {0}")]
    MalformedSpec(String),

    #[error("unexpected apiVersion/kind: {0}")]
    InvalidKind(String),

    #[error("environment not found")]
    NotFound,

    #[error("caller does not own this environment")]
    Forbidden,

    #[error("conflicting update: {0}")]
    Conflict(String),

    #[error("operation not valid in current state: {0}")]
    PreconditionFailed(String),

    #[error("cluster is unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("database error: {source}")]
    Db {
        #[from]
        source: tokio_postgres::Error,
    },

    #[error("failed to get a pooled database connection: {source}")]
    Pool {
        #[from]
        source: deadpool_postgres::PoolError,
    },

    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("yaml error: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
}

impl Error {
    /// Maps a Gateway 404 into the orchestrator-level `NotFound`, and any
    /// other Kubernetes error into `ClusterUnavailable`, matching the
    /// Gateway's three-valued result contract (§4.1).
    pub fn from_kube_not_found(source: kube::Error) -> Self {
        match &source {
            kube::Error::Api(err) if err.code == 404 => Error::NotFound,
            _ => Error::ClusterUnavailable(source.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
