use std::collections::HashSet;

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

use crate::{GithubHandle, LabelName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ItemKind {
    Issue,
    PullRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Open,
    Closed,
}

/// Issue or pull request as seen by the staleness processors.
///
/// Issues and pull requests share a numbering space, so an issue listing may
/// yield pull requests as well; `is_pull_request` tells them apart.
#[derive(Debug, Clone)]
pub struct Item {
    pub number: u64,
    pub kind: ItemKind,
    pub state: ItemState,
    pub labels: HashSet<LabelName>,
    pub is_pull_request: bool,
}

impl Item {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn is_open(&self) -> bool {
        self.state == ItemState::Open
    }

    /// Labels sorted by name, used for log output.
    pub fn sorted_labels(&self) -> Vec<&str> {
        let mut labels = self.labels.iter().map(String::as_str).collect::<Vec<_>>();
        labels.sort_unstable();
        labels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEventKind {
    Labeled,
    Unlabeled,
    Other,
}

#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub kind: TimelineEventKind,
    pub label: Option<LabelName>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TimelineEvent {
    pub fn is_labeled_with(&self, label: &str) -> bool {
        self.kind == TimelineEventKind::Labeled && self.label.as_deref() == Some(label)
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub author: GithubHandle,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub committed_at: Option<DateTime<Utc>>,
}
