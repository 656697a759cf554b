use super::{AdvisorContext, AgentError, prompts};
use crate::knowledge::KnowledgeIndex;
use crate::llm::{Llm, LlmRequest};
use crate::positions::detect_position;
use std::sync::Arc;
use tracing::{debug, warn};

const TOP_K: usize = 3;

/// Answers job questions from the knowledge index.
pub struct InfoAdvisor {
    llm: Arc<dyn Llm>,
    knowledge: Arc<KnowledgeIndex>,
}

impl InfoAdvisor {
    pub fn new(llm: Arc<dyn Llm>, knowledge: Arc<KnowledgeIndex>) -> Self {
        Self { llm, knowledge }
    }

    pub async fn answer(&self, query: &str, ctx: &AdvisorContext<'_>) -> Result<String, AgentError> {
        let job_interest = ctx.user.job_interest.as_deref();
        // Follow-ups like "what's the salary?" should still land on the candidate's position.
        let search = match job_interest {
            Some(position) if detect_position(query).is_none() => format!("{position}: {query}"),
            _ => query.to_string(),
        };

        let chunks = match self.knowledge.query(&search, TOP_K).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Knowledge lookup failed, answering without job information: {}", e);
                Vec::new()
            }
        };
        debug!("Knowledge lookup returned {} chunks", chunks.len());

        let knowledge = chunks
            .iter()
            .map(|(chunk, _)| chunk.format_for_prompt())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = prompts::info_prompt(
            query,
            job_interest,
            &knowledge,
            &ctx.user.conversation_summary,
            &ctx.history_text(),
        );

        let reply = self
            .llm
            .complete(
                LlmRequest::new(prompts::INFO_SYSTEM, prompt)
                    .max_tokens(300)
                    .temperature(0.7),
            )
            .await?;
        Ok(reply.trim().to_string())
    }
}
