use std::{fs, path::Path};

use anyhow::Context as _;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use shared::ItemKind;

use crate::stale::Action;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Pipeline {
    Issues,
    PullRequests,
}

impl From<ItemKind> for Pipeline {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Issue => Pipeline::Issues,
            ItemKind::PullRequest => Pipeline::PullRequests,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ActionType {
    NoOp,
    RemoveStale,
    Warn,
    MarkStale,
    Close,
    Failed,
}

impl From<&Action> for ActionType {
    fn from(action: &Action) -> Self {
        match action {
            Action::NoOp => ActionType::NoOp,
            Action::RemoveStale => ActionType::RemoveStale,
            Action::Warn { .. } => ActionType::Warn,
            Action::MarkStale { .. } => ActionType::MarkStale,
            Action::Close => ActionType::Close,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ActionRecord {
    pub pipeline: Pipeline,
    pub action: ActionType,
    pub dry_run: u32,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TimeMetric {
    pub pipeline: Pipeline,
    pub success: u32,
}

pub struct PrometheusClient {
    registry: Registry,
    action: Family<ActionRecord, Counter>,
    item_processing_time: Family<TimeMetric, Histogram>,

    // Octocrab doesn't expose the rate-limit headers, so both are counted per request
    github_api_read_request: Counter,
    github_api_write_request: Counter,
}

impl Default for PrometheusClient {
    fn default() -> Self {
        let mut registry = Registry::default();
        let action = Family::default();
        let github_api_read_request = Counter::default();
        let github_api_write_request = Counter::default();
        let item_processing_time: Family<TimeMetric, Histogram> =
            Family::new_with_constructor(|| {
                Histogram::new([0.1, 0.25, 0.5, 1., 2.5, 5., 10., 30., 60., f64::INFINITY].into_iter())
            });

        registry.register(
            "github_api_read_requests",
            "Total github read requests issued during the run",
            github_api_read_request.clone(),
        );
        registry.register(
            "github_api_write_requests",
            "Total github write requests issued during the run",
            github_api_write_request.clone(),
        );

        registry.register(
            "stalebot_action",
            "Decision taken for a processed item",
            action.clone(),
        );
        registry.register(
            "stalebot_item_processing_time",
            "Processing time for a single item",
            item_processing_time.clone(),
        );
        Self {
            registry,
            action,
            item_processing_time,
            github_api_read_request,
            github_api_write_request,
        }
    }
}

impl PrometheusClient {
    pub fn record(
        &self,
        kind: ItemKind,
        action: Option<&Action>,
        dry_run: bool,
        started: chrono::DateTime<chrono::Utc>,
    ) {
        let pipeline = kind.into();
        let record = ActionRecord {
            pipeline,
            action: action.map(Into::into).unwrap_or(ActionType::Failed),
            dry_run: dry_run as u32,
        };
        self.action.get_or_create(&record).inc();

        let time = chrono::Utc::now() - started;
        self.item_processing_time
            .get_or_create(&TimeMetric {
                pipeline,
                success: action.is_some() as u32,
            })
            .observe(time.num_milliseconds() as f64 / 1000.0);
    }

    pub fn add_read_request(&self) {
        self.github_api_read_request.inc();
    }

    pub fn add_write_request(&self) {
        self.github_api_write_request.inc();
    }

    pub fn write_requests(&self) -> u64 {
        self.github_api_write_request.get()
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }

    /// Dumps the OpenMetrics text to `path`, replacing any previous run's file.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let metrics = self.encode()?;
        fs::write(path, metrics)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))
    }
}
