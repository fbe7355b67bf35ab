use clap::Parser;
use kubedev_common::args::{
    ClusterArgs, ExpiryArgs, PostgresArgs, ReconcilerArgs, StreamArgs, WebhookArgs,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "KubeDev environment orchestrator HTTP adapter")]
pub struct ServerArgs {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[command(flatten)]
    pub webhook: WebhookArgs,

    #[command(flatten)]
    pub reconciler: ReconcilerArgs,

    #[command(flatten)]
    pub stream: StreamArgs,

    #[command(flatten)]
    pub expiry: ExpiryArgs,

    /// Base URL of the (out-of-scope) template directory service, e.g.
    /// `http://template-directory.internal`. Templates are fetched as
    /// `{base}/templates/{template_id}` and returned as raw manifest
    /// bytes. When unset, `create_stream` only resolves the built-in
    /// `blank` template (see `templates.rs`).
    #[arg(long, env = "TEMPLATE_DIRECTORY_URL")]
    pub template_directory_url: Option<String>,
}
