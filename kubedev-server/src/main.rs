use anyhow::{Context, Result, bail};
use clap::Parser;
use kubedev_common::shutdown::shutdown_signal;
use kubedev_common::webhook::NotificationHook;
use kubedev_orchestrator::Orchestrator;
use kubedev_orchestrator::gateway::{ClusterGateway, GatewayResult};
use kubedev_orchestrator::store::{EnvironmentStore, schema::init_schema};
use owo_colors::OwoColorize;
use tokio::net::TcpListener;

mod app;
mod args;
mod error;
mod principal;
mod routes;
mod sse;
mod templates;

use app::AppState;
use args::ServerArgs;
use templates::TemplateClient;

#[tokio::main]
async fn main() -> Result<()> {
    kubedev_common::init();
    tracing_subscriber::fmt::init();
    let args = ServerArgs::parse();

    let pool = kubedev_common::postgres::create_pool(args.postgres.clone()).await;
    init_schema(&pool)
        .await
        .context("failed to initialize environment_records schema")?;
    let store = EnvironmentStore::new(pool);

    let gateway = match ClusterGateway::connect().await {
        GatewayResult::Ok(gateway) => gateway,
        GatewayResult::Unavailable(reason) => {
            bail!("cluster is unavailable at startup: {reason}");
        }
        GatewayResult::NotFound => unreachable!("connect never returns NotFound"),
    };

    let webhook = NotificationHook::new(args.webhook.notification_webhook_url.clone());
    let orchestrator = Orchestrator::new(
        gateway,
        store,
        webhook,
        args.cluster.clone(),
        args.reconciler.clone(),
        args.stream.clone(),
        args.expiry.clone(),
    );
    kubedev_orchestrator::expiry::spawn(orchestrator.clone());
    let templates = TemplateClient::new(args.template_directory_url.clone());
    let state = AppState::new(orchestrator, templates);

    let app = routes::router(state)
        .layer(axum::middleware::from_fn(kubedev_common::access_log::request))
        .layer(kubedev_common::cors::dev());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "starting kubedev orchestrator HTTP adapter");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    println!("{}", "kubedev-server shut down gracefully".green());
    Ok(())
}
