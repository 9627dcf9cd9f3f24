//! Prompt assembly for persona answers

use crate::error::Result;
use crate::providers::ChatMessage;
use crate::types::{Citation, ContextItem};

use super::profile::ProfileStore;

/// Label opening the context block of the system message
pub const CONTEXT_LABEL: &str = "Contexto de suporte:";

/// Builds the system/user message pair for an agent
pub struct PromptBuilder {
    profiles: ProfileStore,
}

impl PromptBuilder {
    pub fn new(profiles: ProfileStore) -> Self {
        Self { profiles }
    }

    /// `[system, user]`: constitution plus context block, then the trimmed question
    pub async fn build_messages(
        &self,
        agent_slug: &str,
        question: &str,
        items: &[ContextItem],
    ) -> Result<Vec<ChatMessage>> {
        let profile = self.profiles.load(agent_slug).await?;
        let constitution = profile.constitution();
        let context = Self::build_context(items);

        let system = [constitution.as_str(), context.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(vec![
            ChatMessage::system(system.trim()),
            ChatMessage::user(question.trim()),
        ])
    }

    /// Context block ordered by ordinal (stable on ties); empty when there are no items
    pub fn build_context(items: &[ContextItem]) -> String {
        if items.is_empty() {
            return String::new();
        }

        let mut ordered: Vec<&ContextItem> = items.iter().collect();
        ordered.sort_by(|a, b| a.ord.total_cmp(&b.ord));

        let blocks = ordered
            .iter()
            .enumerate()
            .map(|(i, item)| Self::format_passage(item, i))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{}\n\n{}", CONTEXT_LABEL, blocks)
    }

    /// Header `#n — title — section — p. page`, then text, then URL
    fn format_passage(item: &ContextItem, index: usize) -> String {
        let mut header = vec![format!("#{}", index + 1)];

        let title = item.title.trim();
        header.push(if title.is_empty() {
            format!("Trecho {}", index + 1)
        } else {
            title.to_string()
        });
        if let Some(section) = item.section.as_deref().filter(|s| !s.is_empty()) {
            header.push(section.to_string());
        }
        if let Some(page) = &item.page {
            let page = page.to_string();
            if !page.trim().is_empty() {
                header.push(format!("p. {}", page));
            }
        }

        let mut lines = vec![header.join(" — "), item.text.trim().to_string()];
        if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
            lines.push(url.to_string());
        }
        lines.join("\n")
    }

    /// Citation metadata in the order the items are given
    pub fn build_citations(items: &[ContextItem]) -> Vec<Citation> {
        items.iter().map(Citation::from).collect()
    }
}
