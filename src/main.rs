use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit;
mod config;
mod error;
mod events;
mod hr_client;
mod identity;
mod lifecycle;
mod occupancy_client;
mod reconcile;
mod reconcile_tests;
mod remote;
mod server;
mod token;

use audit::AuditLog;
use config::{AppConfig, Cli};
use hr_client::HrClient;
use lifecycle::LifecycleSync;
use occupancy_client::OccupancyClient;
use reconcile::Reconciler;
use server::AppState;
use token::TokenProvider;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config =
        AppConfig::from_env().context("failed to load configuration from environment")?;
    if let Some(host) = cli.host {
        config.server_host = host;
    }
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    let companies = config.companies()?;
    info!("configured for {} companies", companies.len());

    let http = reqwest::Client::builder()
        .timeout(StdDuration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let hr_tokens = Arc::new(TokenProvider::new(
        "hr-platform",
        http.clone(),
        config.hr_token_url.clone(),
        config.hr_client_id.clone(),
        config.hr_client_secret.clone(),
    ));
    let occupancy_tokens = Arc::new(TokenProvider::new(
        "occupancy-platform",
        http.clone(),
        config.occupancy_token_url.clone(),
        config.occupancy_client_id.clone(),
        config.occupancy_client_secret.clone(),
    ));

    let hr = Arc::new(
        HrClient::new(http.clone(), &config.hr_base_url, hr_tokens.clone())
            .context("invalid HR platform base URL")?,
    );
    let occupancy = Arc::new(
        OccupancyClient::new(
            http.clone(),
            &config.occupancy_base_url,
            occupancy_tokens.clone(),
        )
        .context("invalid occupancy platform base URL")?,
    );

    let audit = Arc::new(
        AuditLog::connect(config.audit_database_url.as_deref())
            .await
            .context("failed to connect to audit database")?,
    );
    audit
        .ensure_schema()
        .await
        .context("failed to prepare audit schema")?;

    let reconciler = Arc::new(Reconciler::new(
        hr.clone(),
        occupancy.clone(),
        audit.clone(),
        companies,
    ));
    let lifecycle = Arc::new(LifecycleSync::new(
        occupancy.clone(),
        config.employee_learner_type.clone(),
    ));

    let state = AppState {
        reconciler,
        lifecycle,
        hr_tokens,
        occupancy_tokens,
        webhook_secret: Arc::new(config.webhook_secret.clone()),
    };
    let app = server::router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
