use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    Comment, Commit, Item, ItemKind, ItemState, TimelineEvent, TimelineEventKind,
};

use super::RepositoryService;
use crate::trigger::RepoName;

pub const BOT_LOGIN: &str = "github-actions[bot]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    AddLabel(u64, String),
    RemoveLabel(u64, String),
    Comment(u64, String),
    Close(u64),
}

#[derive(Default)]
struct State {
    items: Vec<Item>,
    timelines: HashMap<u64, Vec<TimelineEvent>>,
    comments: HashMap<u64, Vec<Comment>>,
    commits: HashMap<u64, Vec<Commit>>,
    failing: HashSet<u64>,
    writes: Vec<Write>,
}

/// In-memory repository. Writes are recorded and applied to the stored items,
/// with `clock` used as the creation time of posted comments.
pub struct MockRepository {
    repo: RepoName,
    clock: Mutex<DateTime<Utc>>,
    state: Mutex<State>,
}

impl MockRepository {
    pub fn new(clock: DateTime<Utc>) -> Self {
        Self {
            repo: RepoName {
                owner: "octo".to_string(),
                repo: "widgets".to_string(),
            },
            clock: Mutex::new(clock),
            state: Mutex::new(State::default()),
        }
    }

    pub fn set_clock(&self, clock: DateTime<Utc>) {
        *self.clock.lock().unwrap() = clock;
    }

    pub fn add_item(&self, kind: ItemKind, number: u64, labels: &[&str]) {
        self.state.lock().unwrap().items.push(Item {
            number,
            kind,
            state: ItemState::Open,
            labels: labels.iter().map(|label| label.to_string()).collect(),
            is_pull_request: kind == ItemKind::PullRequest,
        });
    }

    pub fn add_labeled_event(&self, number: u64, label: &str, at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .timelines
            .entry(number)
            .or_default()
            .push(TimelineEvent {
                kind: TimelineEventKind::Labeled,
                label: Some(label.to_string()),
                created_at: Some(at),
            });
    }

    pub fn add_timeline_event(&self, number: u64, event: TimelineEvent) {
        self.state
            .lock()
            .unwrap()
            .timelines
            .entry(number)
            .or_default()
            .push(event);
    }

    pub fn add_comment(&self, number: u64, author: &str, body: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.comments.entry(number).or_default().push(Comment {
            author: author.to_string(),
            body: body.to_string(),
            created_at: at,
        });
    }

    pub fn add_commit(&self, number: u64, at: Option<DateTime<Utc>>) {
        self.state
            .lock()
            .unwrap()
            .commits
            .entry(number)
            .or_default()
            .push(Commit { committed_at: at });
    }

    /// Every read for this item fails from now on.
    pub fn fail_reads(&self, number: u64) {
        self.state.lock().unwrap().failing.insert(number);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn item(&self, number: u64) -> Item {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|item| item.number == number)
            .cloned()
            .expect("item exists")
    }

    fn check_reads(&self, number: u64) -> anyhow::Result<()> {
        if self.state.lock().unwrap().failing.contains(&number) {
            anyhow::bail!("Server error while reading #{number}");
        }
        Ok(())
    }

    fn with_item(&self, number: u64, write: Write, update: impl FnOnce(&mut Item)) {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.items.iter_mut().find(|item| item.number == number) {
            update(item);
        }
        state.writes.push(write);
    }
}

fn capped(items: Vec<Item>, limit: Option<usize>) -> Vec<Item> {
    match limit {
        Some(limit) => items.into_iter().take(limit).collect(),
        None => items,
    }
}

#[async_trait]
impl RepositoryService for MockRepository {
    fn repository(&self) -> &RepoName {
        &self.repo
    }

    async fn open_issues_with_label(
        &self,
        label: &str,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Item>> {
        let items = self
            .state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|item| item.is_open() && item.has_label(label))
            .cloned()
            .collect();
        Ok(capped(items, limit))
    }

    async fn open_pull_requests(&self, limit: Option<usize>) -> anyhow::Result<Vec<Item>> {
        let items = self
            .state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|item| item.is_open() && item.kind == ItemKind::PullRequest)
            .cloned()
            .collect();
        Ok(capped(items, limit))
    }

    async fn timeline(&self, number: u64) -> anyhow::Result<Vec<TimelineEvent>> {
        self.check_reads(number)?;
        let state = self.state.lock().unwrap();
        Ok(state.timelines.get(&number).cloned().unwrap_or_default())
    }

    async fn comments(
        &self,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Comment>> {
        self.check_reads(number)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .comments
            .get(&number)
            .into_iter()
            .flatten()
            .filter(|comment| since.map_or(true, |since| comment.created_at >= since))
            .cloned()
            .collect())
    }

    async fn commits(&self, number: u64) -> anyhow::Result<Vec<Commit>> {
        self.check_reads(number)?;
        let state = self.state.lock().unwrap();
        Ok(state.commits.get(&number).cloned().unwrap_or_default())
    }

    async fn add_label(&self, number: u64, label: &str) -> anyhow::Result<()> {
        let at = *self.clock.lock().unwrap();
        self.with_item(number, Write::AddLabel(number, label.to_string()), |item| {
            item.labels.insert(label.to_string());
        });
        self.add_labeled_event(number, label, at);
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> anyhow::Result<()> {
        self.with_item(number, Write::RemoveLabel(number, label.to_string()), |item| {
            item.labels.remove(label);
        });
        Ok(())
    }

    async fn create_comment(&self, number: u64, body: &str) -> anyhow::Result<()> {
        let at = *self.clock.lock().unwrap();
        self.add_comment(number, BOT_LOGIN, body, at);
        self.with_item(number, Write::Comment(number, body.to_string()), |_| {});
        Ok(())
    }

    async fn close(&self, number: u64) -> anyhow::Result<()> {
        self.with_item(number, Write::Close(number), |item| {
            item.state = ItemState::Closed;
        });
        Ok(())
    }
}
