use chrono::{DateTime, Utc};
use shared::{Comment, Commit, ItemKind, TimelineEvent};

use crate::messages::MsgCategory;

use super::Context;

pub(crate) fn warning_category(kind: ItemKind) -> MsgCategory {
    match kind {
        ItemKind::Issue => MsgCategory::IssueCloseWarning,
        ItemKind::PullRequest => MsgCategory::PrCloseWarning,
    }
}

pub(crate) fn epilogue_category(kind: ItemKind) -> MsgCategory {
    match kind {
        ItemKind::Issue => MsgCategory::IssueCloseEpilogue,
        ItemKind::PullRequest => MsgCategory::PrCloseEpilogue,
    }
}

/// Most recent time `label` was attached. Earlier labelings are superseded.
pub(crate) fn last_labeled_at(events: &[TimelineEvent], label: &str) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|event| event.is_labeled_with(label))
        .filter_map(|event| event.created_at)
        .max()
}

pub(crate) fn last_committed_at(commits: &[Commit]) -> Option<DateTime<Utc>> {
    commits.iter().filter_map(|commit| commit.committed_at).max()
}

impl Context {
    /// Most recent bot comment of the given category created at or after `not_before`.
    pub(crate) fn last_warned_at(
        &self,
        comments: &[Comment],
        category: MsgCategory,
        not_before: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        comments
            .iter()
            .filter(|comment| self.config.bot_logins.contains(&comment.author))
            .filter(|comment| not_before.map_or(true, |time| comment.created_at >= time))
            .filter(|comment| self.messages.is_message(category, &comment.body))
            .map(|comment| comment.created_at)
            .max()
    }
}
