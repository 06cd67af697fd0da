use std::{fmt, fs, path::PathBuf, str::FromStr};

use anyhow::Context as _;
use serde::Deserialize;

/// Repository used when a manual run has no event payload. Only meant for local testing.
pub const PLACEHOLDER_REPOSITORY: &str = "astropy/astropy";

/// Variables provided by the GitHub Actions runner.
#[derive(Debug, Default, Deserialize)]
pub struct GithubEnv {
    pub github_token: Option<String>,
    pub github_event_name: Option<String>,
    pub github_event_path: Option<PathBuf>,
    pub github_repository: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Schedule,
    WorkflowDispatch,
}

impl Trigger {
    /// Returns `None` for events the bot doesn't react to.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "schedule" => Some(Trigger::Schedule),
            "workflow_dispatch" => Some(Trigger::WorkflowDispatch),
            _ => None,
        }
    }

    pub fn repository(&self, env: &GithubEnv) -> anyhow::Result<RepoName> {
        match self {
            Trigger::Schedule => env
                .github_repository
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GITHUB_REPOSITORY is not set for a scheduled run"))?
                .parse(),
            Trigger::WorkflowDispatch => match &env.github_event_path {
                Some(path) => {
                    let payload = fs::read_to_string(path).with_context(|| {
                        format!("Failed to read event payload {}", path.display())
                    })?;
                    repository_from_payload(&payload)
                }
                None => PLACEHOLDER_REPOSITORY.parse(),
            },
        }
    }
}

#[derive(Deserialize)]
struct EventPayload {
    repository: PayloadRepository,
}

#[derive(Deserialize)]
struct PayloadRepository {
    full_name: String,
}

pub fn repository_from_payload(payload: &str) -> anyhow::Result<RepoName> {
    let payload: EventPayload =
        serde_json::from_str(payload).context("Failed to parse event payload")?;
    payload.repository.full_name.parse()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoName {
    type Err = anyhow::Error;

    fn from_str(full_name: &str) -> anyhow::Result<Self> {
        match full_name.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(anyhow::anyhow!(
                "Expected repository in the owner/repo format, got `{full_name}`"
            )),
        }
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
