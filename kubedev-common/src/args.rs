use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DATABASE", default_value = "kubedev")]
    pub postgres_database: String,

    #[arg(long, env = "POSTGRES_USERNAME", default_value = "kubedev")]
    pub postgres_username: String,

    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,

    #[arg(long, env = "POSTGRES_CA_CERT")]
    pub postgres_ca_cert: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ClusterArgs {
    /// Override the API server address; empty uses the ambient kubeconfig
    /// or in-cluster config.
    #[arg(long, env = "CLUSTER_API_ADDRESS")]
    pub cluster_api_address: Option<String>,

    #[arg(long, env = "CLUSTER_VERIFY_TLS", default_value_t = true)]
    pub cluster_verify_tls: bool,

    /// Namespace that every `KubeDevEnvironment` custom object is created
    /// in. Shared across tenants; see DESIGN.md for why `Delete` never
    /// deletes this namespace.
    #[arg(long, env = "CR_NAMESPACE", default_value = "kubdev-users")]
    pub cr_namespace: String,

    #[arg(long, env = "DEFAULT_CPU", default_value = "1000m")]
    pub default_cpu: String,

    #[arg(long, env = "DEFAULT_MEMORY", default_value = "2Gi")]
    pub default_memory: String,

    #[arg(long, env = "DEFAULT_STORAGE", default_value = "10Gi")]
    pub default_storage: String,

    #[arg(long, env = "ENVIRONMENT_TIMEOUT_HOURS", default_value_t = 8)]
    pub environment_timeout_hours: i64,

    /// Suffix used to turn an Ingress host into a browsable access URL.
    #[arg(long, env = "PLATFORM_DOMAIN", default_value = "kubedev.local")]
    pub platform_domain: String,
}

#[derive(Parser, Debug, Clone)]
pub struct WebhookArgs {
    #[arg(long, env = "NOTIFICATION_WEBHOOK_URL")]
    pub notification_webhook_url: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReconcilerArgs {
    #[arg(long, env = "RECONCILER_POLL_INTERVAL_SECS", default_value_t = 30)]
    pub reconciler_poll_interval_secs: u64,

    #[arg(long, env = "RECONCILER_MAX_WAIT_SECS", default_value_t = 300)]
    pub reconciler_max_wait_secs: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct ExpiryArgs {
    /// How often the background sweep checks for `Running`/`Stopped`
    /// records whose `expires_at` has passed.
    #[arg(long, env = "EXPIRY_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub expiry_sweep_interval_secs: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct StreamArgs {
    #[arg(long, env = "STREAM_POLL_INTERVAL_SECS", default_value_t = 2)]
    pub stream_poll_interval_secs: u64,

    #[arg(long, env = "STREAM_MAX_WAIT_SECS", default_value_t = 90)]
    pub stream_max_wait_secs: u64,

    #[arg(long, env = "STREAM_HEARTBEAT_EVERY", default_value_t = 5)]
    pub stream_heartbeat_every: u64,
}
