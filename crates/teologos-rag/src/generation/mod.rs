//! Prompt assembly and chat completion

pub mod llm_client;
pub mod profile;
pub mod prompt;

pub use llm_client::{Completion, LlmClient};
pub use profile::{AgentProfile, ProfileStore};
pub use prompt::PromptBuilder;
