use octocrab::models::{
    issues, pulls, repos::RepoCommit, timelines, Event as TimelineEventType, IssueState, Label,
};

use crate::{Comment, Commit, Item, ItemKind, ItemState, TimelineEvent, TimelineEventKind};

fn item_state(state: &IssueState) -> ItemState {
    if matches!(state, IssueState::Open) {
        ItemState::Open
    } else {
        ItemState::Closed
    }
}

fn label_names(labels: Vec<Label>) -> std::collections::HashSet<String> {
    labels.into_iter().map(|label| label.name).collect()
}

impl From<issues::Issue> for Item {
    fn from(issue: issues::Issue) -> Self {
        Self {
            number: issue.number,
            kind: ItemKind::Issue,
            state: item_state(&issue.state),
            labels: label_names(issue.labels),
            is_pull_request: issue.pull_request.is_some(),
        }
    }
}

impl From<pulls::PullRequest> for Item {
    fn from(pr: pulls::PullRequest) -> Self {
        let state = match (&pr.state, pr.closed_at) {
            (Some(state), _) => item_state(state),
            (None, Some(_)) => ItemState::Closed,
            (None, None) => ItemState::Open,
        };
        Self {
            number: pr.number,
            kind: ItemKind::PullRequest,
            state,
            labels: label_names(pr.labels.unwrap_or_default()),
            is_pull_request: true,
        }
    }
}

impl From<timelines::TimelineEvent> for TimelineEvent {
    fn from(event: timelines::TimelineEvent) -> Self {
        let kind = match event.event {
            TimelineEventType::Labeled => TimelineEventKind::Labeled,
            TimelineEventType::Unlabeled => TimelineEventKind::Unlabeled,
            _ => TimelineEventKind::Other,
        };
        Self {
            kind,
            label: event.label.map(|label| label.name),
            created_at: event.created_at,
        }
    }
}

impl From<issues::Comment> for Comment {
    fn from(comment: issues::Comment) -> Self {
        Self {
            author: comment.user.login,
            created_at: comment.created_at,
            body: comment
                .body
                .or(comment.body_text)
                .or(comment.body_html)
                .unwrap_or_default(),
        }
    }
}

impl From<RepoCommit> for Commit {
    fn from(commit: RepoCommit) -> Self {
        Self {
            committed_at: commit.commit.committer.and_then(|committer| committer.date),
        }
    }
}
