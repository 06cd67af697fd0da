use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{models::IssueState, params, Page};
use serde::de::DeserializeOwned;
use shared::{Comment, Commit, Item, TimelineEvent};
use tracing::{debug, instrument, warn};

use crate::trigger::RepoName;

#[cfg(test)]
pub mod mock;
pub mod prometheus;

const PER_PAGE: u8 = 100;

/// Reads and writes the staleness processors need from the hosting service.
///
/// Pagination and rate limiting are the implementation's concern; every
/// listing returns the complete (or capped) result.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    fn repository(&self) -> &RepoName;

    /// Open issues carrying `label`. Pull requests may be part of the result.
    async fn open_issues_with_label(
        &self,
        label: &str,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Item>>;

    async fn open_pull_requests(&self, limit: Option<usize>) -> anyhow::Result<Vec<Item>>;

    async fn timeline(&self, number: u64) -> anyhow::Result<Vec<TimelineEvent>>;

    /// Comments on the issue or pull request, optionally only the ones updated since `since`.
    async fn comments(
        &self,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Comment>>;

    async fn commits(&self, number: u64) -> anyhow::Result<Vec<Commit>>;

    async fn add_label(&self, number: u64, label: &str) -> anyhow::Result<()>;

    async fn remove_label(&self, number: u64, label: &str) -> anyhow::Result<()>;

    async fn create_comment(&self, number: u64, body: &str) -> anyhow::Result<()>;

    async fn close(&self, number: u64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct GithubClient {
    octocrab: octocrab::Octocrab,
    prometheus: Arc<prometheus::PrometheusClient>,
    repo: RepoName,
}

impl GithubClient {
    pub fn new(
        github_token: Option<String>,
        repo: RepoName,
        prometheus: Arc<prometheus::PrometheusClient>,
    ) -> anyhow::Result<Self> {
        let builder = octocrab::Octocrab::builder();
        let octocrab = match github_token {
            Some(token) => builder.personal_token(token).build()?,
            None => {
                warn!("GITHUB_TOKEN is not set. Using anonymous access, writes will fail");
                builder.build()?
            }
        };

        Ok(Self {
            octocrab,
            prometheus,
            repo,
        })
    }

    async fn collect_pages<T: DeserializeOwned>(
        &self,
        mut page: Page<T>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<T>> {
        self.prometheus.add_read_request();
        let mut items = Vec::new();

        loop {
            items.extend(page.take_items());
            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    return Ok(items);
                }
            }

            if page.next.is_none() {
                return Ok(items);
            }
            self.prometheus.add_read_request();
            match self.octocrab.get_page(&page.next).await? {
                Some(next) => page = next,
                None => return Ok(items),
            }
        }
    }
}

#[async_trait]
impl RepositoryService for GithubClient {
    fn repository(&self) -> &RepoName {
        &self.repo
    }

    #[instrument(skip(self))]
    async fn open_issues_with_label(
        &self,
        label: &str,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<Item>> {
        let labels = vec![label.to_string()];
        let page = self
            .octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .list()
            .state(params::State::Open)
            .labels(&labels)
            .per_page(PER_PAGE)
            .send()
            .await?;

        let issues = self.collect_pages(page, limit).await?;
        Ok(issues.into_iter().map(Item::from).collect())
    }

    #[instrument(skip(self))]
    async fn open_pull_requests(&self, limit: Option<usize>) -> anyhow::Result<Vec<Item>> {
        let page = self
            .octocrab
            .pulls(&self.repo.owner, &self.repo.repo)
            .list()
            .state(params::State::Open)
            .per_page(PER_PAGE)
            .send()
            .await?;

        let pulls = self.collect_pages(page, limit).await?;
        Ok(pulls.into_iter().map(Item::from).collect())
    }

    #[instrument(skip(self))]
    async fn timeline(&self, number: u64) -> anyhow::Result<Vec<TimelineEvent>> {
        let page = self
            .octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .list_timeline_events(number)
            .per_page(PER_PAGE)
            .send()
            .await?;

        let events = self.collect_pages(page, None).await?;
        Ok(events.into_iter().map(TimelineEvent::from).collect())
    }

    #[instrument(skip(self))]
    async fn comments(
        &self,
        number: u64,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Comment>> {
        let issues = self.octocrab.issues(&self.repo.owner, &self.repo.repo);
        let mut request = issues.list_comments(number).per_page(PER_PAGE);
        if let Some(since) = since {
            request = request.since(since);
        }
        let page = request.send().await?;

        let comments = self.collect_pages(page, None).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    #[instrument(skip(self))]
    async fn commits(&self, number: u64) -> anyhow::Result<Vec<Commit>> {
        let page = self
            .octocrab
            .pulls(&self.repo.owner, &self.repo.repo)
            .pr_commits(number)
            .per_page(PER_PAGE)
            .send()
            .await?;

        let commits = self.collect_pages(page, None).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }

    #[instrument(skip(self))]
    async fn add_label(&self, number: u64, label: &str) -> anyhow::Result<()> {
        self.prometheus.add_write_request();
        self.octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .add_labels(number, &[label.to_string()])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_label(&self, number: u64, label: &str) -> anyhow::Result<()> {
        self.prometheus.add_write_request();
        let labels = self
            .octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .remove_label(number, label)
            .await?;
        debug!("Labels left on #{number}: {}", labels.len());
        Ok(())
    }

    #[instrument(skip(self, body))]
    async fn create_comment(&self, number: u64, body: &str) -> anyhow::Result<()> {
        self.prometheus.add_write_request();
        self.octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .create_comment(number, body)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self, number: u64) -> anyhow::Result<()> {
        self.prometheus.add_write_request();
        self.octocrab
            .issues(&self.repo.owner, &self.repo.repo)
            .update(number)
            .state(IssueState::Closed)
            .send()
            .await?;
        Ok(())
    }
}
