use std::sync::Arc;

use shared::ItemKind;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::{
    api::{prometheus::PrometheusClient, GithubClient},
    config::StaleConfig,
    messages::MessageLoader,
    stale::Context,
    trigger::{GithubEnv, Trigger},
};

pub mod api;
pub mod config;
pub mod messages;
pub mod stale;
pub mod trigger;

/// Runs one pipeline for the repository that triggered the workflow.
pub async fn run(kind: ItemKind) -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    let env = envy::from_env::<GithubEnv>()?;
    let event_name = env.github_event_name.as_deref().unwrap_or("unknown");
    let Some(trigger) = Trigger::from_event_name(event_name) else {
        info!("No-op for {event_name}");
        return Ok(());
    };

    let repo = trigger.repository(&env)?;
    let config = StaleConfig::from_env()?;
    let pipeline = config.pipeline(kind)?;
    if pipeline.dry_run {
        warn!("Dry run enabled, nothing will be written to {repo}");
    }

    let messages = match &config.message_file {
        Some(path) => MessageLoader::load_from_file(path, &pipeline.labels.stale)?,
        None => MessageLoader::embedded(&pipeline.labels.stale)?,
    };

    let prometheus: Arc<PrometheusClient> = Default::default();
    let github = GithubClient::new(env.github_token, repo, prometheus.clone())?;
    let context = Context {
        repository: Arc::new(github),
        messages: messages.into(),
        prometheus: prometheus.clone(),
        config: pipeline,
    };

    info!("Starting stale {kind} run ({trigger:?})");
    let summary = stale::run(&context, kind).await?;
    info!("Done: {summary}");

    if let Some(path) = &config.metrics_file {
        prometheus.write_to(path)?;
    }

    Ok(())
}
