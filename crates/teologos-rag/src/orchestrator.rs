//! Ask flow: retrieve, build the prompt, complete, cite

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::{LlmClient, PromptBuilder};
use crate::retrieval::RetrievalService;
use crate::types::AskResponse;

pub struct AskOrchestrator {
    retrieval: Arc<RetrievalService>,
    prompts: PromptBuilder,
    llm: LlmClient,
    top_k: usize,
}

impl AskOrchestrator {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        prompts: PromptBuilder,
        llm: LlmClient,
        top_k: usize,
    ) -> Self {
        Self {
            retrieval,
            prompts,
            llm,
            top_k,
        }
    }

    /// Answer `question` as `agent_slug`.
    ///
    /// The prompt shows context in ordinal order; citations keep retrieval order.
    /// A persona without a profile is a deployment fault, reported as internal.
    pub async fn ask(&self, agent_slug: &str, question: &str) -> Result<AskResponse> {
        let items = self
            .retrieval
            .retrieve(agent_slug, question, self.top_k)
            .await?;

        let messages = self
            .prompts
            .build_messages(agent_slug, question, &items)
            .await
            .map_err(|err| match err {
                Error::NotFound(what) => {
                    tracing::error!("No persona profile for {}: {} missing", agent_slug, what);
                    Error::internal(format!("{} is not configured", what))
                }
                other => other,
            })?;
        let completion = self.llm.complete(&messages).await?;

        Ok(AskResponse {
            answer: completion.answer,
            citations: PromptBuilder::build_citations(&items),
        })
    }
}
