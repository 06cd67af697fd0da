use std::{collections::HashSet, path::PathBuf, time::Duration};

use anyhow::Context as _;
use chrono::TimeDelta;
use serde::Deserialize;
use shared::{GithubHandle, ItemKind, LabelName};

pub const ENV_PREFIX: &str = "STALEBOT_";

/// Raw `STALEBOT_*` environment configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StaleConfig {
    #[serde(default)]
    pub dryrun: i64,
    #[serde(default = "default_stale_label")]
    pub stale_label: LabelName,
    #[serde(default = "default_keep_open_label")]
    pub keep_open_label: LabelName,
    #[serde(default = "default_closed_by_bot_label")]
    pub closed_by_bot_label: LabelName,
    #[serde(default = "default_max_issues")]
    pub max_issues: i64,
    #[serde(default = "default_max_prs")]
    pub max_prs: i64,
    #[serde(default)]
    pub sleep: f64,
    #[serde(default)]
    pub warn_issue_seconds: f64,
    #[serde(default = "default_close_issue_seconds")]
    pub close_issue_seconds: f64,
    #[serde(default = "default_warn_pr_seconds")]
    pub warn_pr_seconds: f64,
    #[serde(default = "default_close_pr_seconds")]
    pub close_pr_seconds: f64,
    #[serde(default = "default_bot_logins")]
    pub bot_logins: Vec<GithubHandle>,
    pub message_file: Option<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

fn default_stale_label() -> LabelName {
    "Close?".to_string()
}

fn default_keep_open_label() -> LabelName {
    "keep-open".to_string()
}

fn default_closed_by_bot_label() -> LabelName {
    "closed-by-bot".to_string()
}

fn default_max_issues() -> i64 {
    50
}

fn default_max_prs() -> i64 {
    200
}

// 7 days
fn default_close_issue_seconds() -> f64 {
    604_800.
}

// ~5 months
fn default_warn_pr_seconds() -> f64 {
    12_960_000.
}

// 30 days
fn default_close_pr_seconds() -> f64 {
    2_592_000.
}

fn default_bot_logins() -> Vec<GithubHandle> {
    vec![
        "github-actions[bot]".to_string(),
        "astropy-bot[bot]".to_string(),
        "pllim".to_string(),
    ]
}

#[derive(Debug, Clone)]
pub struct Labels {
    pub stale: LabelName,
    pub keep_open: LabelName,
    pub closed_by_bot: LabelName,
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Elapsed time before the first warning is eligible.
    pub warn: TimeDelta,
    /// Elapsed time after a valid warning before closing is eligible.
    pub close: TimeDelta,
}

/// Everything a single pipeline run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub labels: Labels,
    pub thresholds: Thresholds,
    pub max_items: Option<usize>,
    pub sleep: Duration,
    pub dry_run: bool,
    pub bot_logins: HashSet<GithubHandle>,
}

impl StaleConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dryrun == 1
    }

    pub fn pipeline(&self, kind: ItemKind) -> anyhow::Result<PipelineConfig> {
        let (max_items, warn, close) = match kind {
            ItemKind::Issue => (
                self.max_issues,
                self.warn_issue_seconds,
                self.close_issue_seconds,
            ),
            ItemKind::PullRequest => (self.max_prs, self.warn_pr_seconds, self.close_pr_seconds),
        };

        Ok(PipelineConfig {
            labels: Labels {
                stale: self.stale_label.clone(),
                keep_open: self.keep_open_label.clone(),
                closed_by_bot: self.closed_by_bot_label.clone(),
            },
            thresholds: Thresholds {
                warn: seconds_to_delta(warn)
                    .with_context(|| format!("Invalid warn threshold for {kind}"))?,
                close: seconds_to_delta(close)
                    .with_context(|| format!("Invalid close threshold for {kind}"))?,
            },
            // Negative cap disables the cutoff
            max_items: usize::try_from(max_items).ok(),
            sleep: Duration::try_from_secs_f64(self.sleep).unwrap_or_default(),
            dry_run: self.is_dry_run(),
            bot_logins: self.bot_logins.iter().cloned().collect(),
        })
    }
}

fn seconds_to_delta(seconds: f64) -> anyhow::Result<TimeDelta> {
    let millis = (seconds * 1000.).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        anyhow::bail!("{seconds} seconds is out of range");
    }
    TimeDelta::try_milliseconds(millis as i64)
        .ok_or_else(|| anyhow::anyhow!("{seconds} seconds is out of range"))
}
