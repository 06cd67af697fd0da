use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use shared::{natural_delta, Item, ItemKind};
use tracing::{debug, error, info, instrument};

use crate::{
    api::{prometheus::PrometheusClient, RepositoryService},
    config::PipelineConfig,
    messages::{MessageLoader, MsgCategory},
};

mod common;
pub mod issues;
pub mod pulls;

#[derive(Clone)]
pub struct Context {
    pub repository: Arc<dyn RepositoryService>,
    pub messages: Arc<MessageLoader>,
    pub prometheus: Arc<PrometheusClient>,
    pub config: PipelineConfig,
}

/// State transition decided for a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp,
    /// Maintainer override: drop the stale label and leave the item alone.
    RemoveStale,
    /// Post a close warning. `pasttime` describes how long the item has been inactive.
    Warn { pasttime: String },
    /// Attach the stale label, warning as well unless a valid warning exists.
    MarkStale { warning: Option<String> },
    Close,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => write!(f, "NoOp"),
            Action::RemoveStale => write!(f, "RemoveStale"),
            Action::Warn { .. } => write!(f, "Warn"),
            Action::MarkStale { .. } => write!(f, "MarkStale"),
            Action::Close => write!(f, "Close"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub unlabeled: usize,
    pub warned: usize,
    pub marked_stale: usize,
    pub closed: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, action: &Action) {
        self.processed += 1;
        match action {
            Action::NoOp => {}
            Action::RemoveStale => self.unlabeled += 1,
            Action::Warn { .. } => self.warned += 1,
            Action::MarkStale { warning } => {
                self.marked_stale += 1;
                self.warned += warning.is_some() as usize;
            }
            Action::Close => self.closed += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} unlabeled, {} warned, {} marked stale, {} closed, {} failed",
            self.processed,
            self.unlabeled,
            self.warned,
            self.marked_stale,
            self.closed,
            self.failed
        )
    }
}

pub async fn run(context: &Context, kind: ItemKind) -> anyhow::Result<RunSummary> {
    run_at(context, kind, Utc::now()).await
}

/// Processes every candidate item one by one, judging staleness against `now`.
///
/// A failure on one item is logged and doesn't stop the run. Only failing to
/// list the candidates is returned as an error.
#[instrument(skip(context, now), fields(repo = %context.repository.repository(), dry_run = context.config.dry_run))]
pub async fn run_at(
    context: &Context,
    kind: ItemKind,
    now: DateTime<Utc>,
) -> anyhow::Result<RunSummary> {
    let config = &context.config;
    let items = match kind {
        ItemKind::Issue => {
            context
                .repository
                .open_issues_with_label(&config.labels.stale, config.max_items)
                .await?
        }
        ItemKind::PullRequest => context.repository.open_pull_requests(config.max_items).await?,
    };
    info!("Received {} candidate {kind} items", items.len());

    let mut summary = RunSummary::default();
    for (i, item) in items.iter().enumerate() {
        if i > 0 && !config.dry_run && !config.sleep.is_zero() {
            tokio::time::sleep(config.sleep).await;
        }

        let started = Utc::now();
        let result = context.process(kind, item, now).await;
        match &result {
            Ok(action) => summary.record(action),
            Err(e) => {
                error!("-> ERROR while processing {kind} #{}: {e:?}", item.number);
                summary.failed += 1;
            }
        }
        context
            .prometheus
            .record(kind, result.as_ref().ok(), config.dry_run, started);
    }

    info!("Finished processing stale {kind} items: {summary}");
    Ok(summary)
}

impl Context {
    async fn process(
        &self,
        kind: ItemKind,
        item: &Item,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Action> {
        let action = match kind {
            ItemKind::Issue => issues::decide(self, item, now).await?,
            ItemKind::PullRequest => pulls::decide(self, item, now).await?,
        };
        self.apply(item, &action).await?;
        Ok(action)
    }

    async fn apply(&self, item: &Item, action: &Action) -> anyhow::Result<()> {
        if *action == Action::NoOp {
            return Ok(());
        }
        if self.config.dry_run {
            debug!("Dry run. Skipping writes of {action} for #{}", item.number);
            return Ok(());
        }

        let labels = &self.config.labels;
        match action {
            Action::NoOp => {}
            Action::RemoveStale => {
                self.repository
                    .remove_label(item.number, &labels.stale)
                    .await?
            }
            Action::Warn { pasttime } => {
                self.reply(item, common::warning_category(item.kind), Some(pasttime))
                    .await?
            }
            Action::MarkStale { warning } => {
                self.repository.add_label(item.number, &labels.stale).await?;
                if let Some(pasttime) = warning {
                    self.reply(item, common::warning_category(item.kind), Some(pasttime))
                        .await?;
                }
            }
            Action::Close => {
                self.repository
                    .add_label(item.number, &labels.closed_by_bot)
                    .await?;
                self.reply(item, common::epilogue_category(item.kind), None)
                    .await?;
                self.repository.close(item.number).await?;
            }
        }
        Ok(())
    }

    async fn reply(
        &self,
        item: &Item,
        category: MsgCategory,
        pasttime: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut values: HashMap<&'static str, String> = [
            ("closelabel", self.config.labels.stale.clone()),
            ("keepopen", self.config.labels.keep_open.clone()),
            ("futuretime", natural_delta(self.config.thresholds.close)),
        ]
        .into_iter()
        .collect();
        if let Some(pasttime) = pasttime {
            values.insert("pasttime", pasttime.to_string());
        }

        let text = self.messages.render(category, &values)?;
        self.repository.create_comment(item.number, &text).await
    }
}
