use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use strum::{Display, EnumString};
use tracing::error;

const DEFAULT_MESSAGES: &str = include_str!("../../Messages.toml");

const MARKER_PREFIX: &str = "<!-- stalebot:";
const MARKER_SUFFIX: &str = "-->";
pub const MARKER_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum MsgCategory {
    IssueCloseWarning,
    IssueCloseEpilogue,
    PrCloseWarning,
    PrCloseEpilogue,
}

/// Hidden tag appended to every comment the bot posts, so that later runs can
/// recognize their own messages regardless of the wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub category: MsgCategory,
    pub version: u32,
}

impl Marker {
    pub fn new(category: MsgCategory) -> Self {
        Self {
            category,
            version: MARKER_VERSION,
        }
    }

    /// Finds the first well-formed marker in a comment body.
    pub fn parse(body: &str) -> Option<Self> {
        body.match_indices(MARKER_PREFIX).find_map(|(start, _)| {
            let rest = &body[start + MARKER_PREFIX.len()..];
            let end = rest.find(MARKER_SUFFIX)?;
            let (category, version) = rest[..end].trim().split_once(':')?;
            Some(Self {
                category: category.parse().ok()?,
                version: version.strip_prefix('v')?.parse().ok()?,
            })
        })
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{MARKER_PREFIX}{}:v{} {MARKER_SUFFIX}",
            self.category, self.version
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Messages {
    message: Vec<String>,
    variables: HashSet<String>,
}

impl Messages {
    pub fn format(&self, values: &HashMap<&'static str, String>) -> anyhow::Result<String> {
        let mut formatted_message = self
            .message
            .choose(&mut thread_rng())
            .ok_or_else(|| anyhow::anyhow!("Failed to choose randomly an message"))?
            .clone();
        for key in self.variables.iter() {
            if let Some(value) = values.get(key.as_str()) {
                formatted_message = formatted_message.replace(&format!("{{{}}}", key), value);
            } else {
                error!(
                    "The message expects a variable: {}, but it wasn't provided",
                    key
                );
            }
        }
        Ok(formatted_message)
    }

    fn partial_format(&mut self, values: &HashMap<&'static str, String>) {
        for message in self.message.iter_mut() {
            for (key, value) in values {
                *message = message.replace(&format!("{{{key}}}"), value);
                self.variables.remove(*key);
            }
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct MessageLoader {
    pub link: String,

    pub issue_close_warnings: Messages,
    pub issue_close_epilogues: Messages,
    pub pr_close_warnings: Messages,
    pub pr_close_epilogues: Messages,

    #[serde(skip)]
    stale_label: String,
}

impl MessageLoader {
    pub fn load_from_file(file_path: &Path, stale_label: &str) -> anyhow::Result<Self> {
        let file_content = fs::read_to_string(file_path)?;
        Self::load_from_str(&file_content, stale_label)
    }

    /// Messages shipped with the binary.
    pub fn embedded(stale_label: &str) -> anyhow::Result<Self> {
        Self::load_from_str(DEFAULT_MESSAGES, stale_label)
    }

    fn load_from_str(content: &str, stale_label: &str) -> anyhow::Result<Self> {
        let mut result: Self = toml::from_str(content)?;
        result.stale_label = stale_label.to_string();
        result.postprocess_messages(stale_label);
        tracing::trace!("Loaded messages: {:#?}", result);
        Ok(result)
    }

    fn postprocess_messages(&mut self, stale_label: &str) {
        let values = vec![
            ("link", self.link.clone()),
            ("closelabel", stale_label.to_string()),
        ]
        .into_iter()
        .collect::<HashMap<_, _>>();

        let array_of_messages = vec![
            &mut self.issue_close_warnings,
            &mut self.issue_close_epilogues,
            &mut self.pr_close_warnings,
            &mut self.pr_close_epilogues,
        ];
        for message in array_of_messages {
            message.partial_format(&values);
        }
    }

    pub fn get_message(&self, category: MsgCategory) -> &Messages {
        match category {
            MsgCategory::IssueCloseWarning => &self.issue_close_warnings,
            MsgCategory::IssueCloseEpilogue => &self.issue_close_epilogues,
            MsgCategory::PrCloseWarning => &self.pr_close_warnings,
            MsgCategory::PrCloseEpilogue => &self.pr_close_epilogues,
        }
    }

    /// Formats a message of the given category and tags it with its marker.
    pub fn render(
        &self,
        category: MsgCategory,
        values: &HashMap<&'static str, String>,
    ) -> anyhow::Result<String> {
        let text = self.get_message(category).format(values)?;
        Ok(format!("{text}\n\n{}", Marker::new(category)))
    }

    /// Checks whether a comment body is a message of the given category.
    ///
    /// Comments without a marker predate it, so they're matched against the
    /// opening phrase the old templates used.
    pub fn is_message(&self, category: MsgCategory, body: &str) -> bool {
        match Marker::parse(body) {
            Some(marker) => marker.category == category,
            None => body.contains(&self.legacy_opening(category)),
        }
    }

    fn legacy_opening(&self, category: MsgCategory) -> String {
        match category {
            MsgCategory::IssueCloseWarning => format!(
                "Hi humans :wave: - this issue was labeled as **{}**",
                self.stale_label
            ),
            MsgCategory::IssueCloseEpilogue => {
                "I'm going to close this issue as per my previous message".to_string()
            }
            MsgCategory::PrCloseWarning => {
                "Hi humans :wave: - this pull request hasn't had any new commits".to_string()
            }
            MsgCategory::PrCloseEpilogue => "I'm going to close this pull request".to_string(),
        }
    }
}
