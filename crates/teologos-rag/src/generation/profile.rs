//! Persona profiles loaded from `<profiles_dir>/<slug>.json`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Constitution given either as one block or as a list of lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constitution {
    Lines(Vec<String>),
    Text(String),
}

/// Static persona configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub prompt_constitution: Option<Constitution>,
}

impl AgentProfile {
    pub fn with_constitution(text: impl Into<String>) -> Self {
        Self {
            display_name: None,
            prompt_constitution: Some(Constitution::Text(text.into())),
        }
    }

    /// Constitution text; list entries are trimmed, blanks dropped, joined by newlines
    pub fn constitution(&self) -> String {
        match &self.prompt_constitution {
            Some(Constitution::Lines(lines)) => lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Some(Constitution::Text(text)) => text.trim().to_string(),
            None => String::new(),
        }
    }
}

enum ProfileSource {
    Directory(PathBuf),
    Fixed(HashMap<String, AgentProfile>),
}

/// Looks up persona profiles by agent slug
pub struct ProfileStore {
    source: ProfileSource,
}

impl ProfileStore {
    /// Read profiles from disk on every lookup, so edits apply without restart
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: ProfileSource::Directory(dir.into()),
        }
    }

    /// Fixed set of profiles
    pub fn from_profiles<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (S, AgentProfile)>,
        S: Into<String>,
    {
        Self {
            source: ProfileSource::Fixed(
                profiles.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ),
        }
    }

    pub async fn load(&self, agent_slug: &str) -> Result<AgentProfile> {
        let slug = agent_slug.trim();
        if slug.is_empty() {
            return Err(Error::validation("Agent slug is required to load the profile"));
        }
        // Slugs become file names
        if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::NotFound(format!("profile {}", slug)));
        }

        match &self.source {
            ProfileSource::Fixed(profiles) => profiles
                .get(slug)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("profile {}", slug))),
            ProfileSource::Directory(dir) => {
                let path = dir.join(format!("{}.json", slug));
                let raw = match tokio::fs::read_to_string(&path).await {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(Error::NotFound(format!("profile {}", slug)));
                    }
                    Err(e) => return Err(e.into()),
                };
                let profile = serde_json::from_str(&raw).map_err(|e| {
                    Error::Config(format!("Invalid profile {}: {}", path.display(), e))
                })?;
                Ok(profile)
            }
        }
    }
}
