use super::{AgentError, prompts, responses};
use crate::conversation::{Turn, UserRecord};
use crate::llm::{Llm, LlmRequest};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ExitOutcome {
    pub summary: String,
    pub farewell: String,
}

/// Closes a conversation: a rolling summary for the recruiter and a goodbye for the candidate.
pub struct ExitAdvisor {
    llm: Arc<dyn Llm>,
    summary_model: Option<String>,
}

impl ExitAdvisor {
    pub fn new(llm: Arc<dyn Llm>, summary_model: Option<String>) -> Self {
        Self { llm, summary_model }
    }

    /// Second opinion on a rule-table exit. Only a clear "no" keeps the
    /// conversation going; a provider error trusts the rule.
    pub async fn confirm_exit(&self, message: &str, history: &[Turn]) -> bool {
        let history = history
            .iter()
            .map(Turn::format_for_context)
            .collect::<Vec<_>>()
            .join("\n");
        let request = LlmRequest::new(
            prompts::EXIT_CONFIRM_SYSTEM,
            prompts::exit_confirm_prompt(message, &history),
        )
        .max_tokens(10)
        .temperature(0.1)
        .model(self.summary_model.as_deref());

        match self.llm.complete(request).await {
            Ok(answer) => {
                let word = answer
                    .split(|c: char| !c.is_alphabetic())
                    .find(|w| !w.is_empty())
                    .map(str::to_lowercase);
                word.as_deref() != Some("no")
            }
            Err(e) => {
                warn!("Exit confirmation failed, keeping the exit: {}", e);
                true
            }
        }
    }

    /// `history` is every stored turn for the candidate plus the closing message.
    pub async fn summarize_and_close(
        &self,
        user: &UserRecord,
        history: &[Turn],
        message: &str,
    ) -> Result<ExitOutcome, AgentError> {
        let transcript = history
            .iter()
            .map(Turn::format_for_context)
            .collect::<Vec<_>>()
            .join("\n");
        let request = LlmRequest::new(
            prompts::SUMMARY_SYSTEM,
            prompts::summary_prompt(&user.phone_number, &user.conversation_summary, &transcript),
        )
        .max_tokens(500)
        .temperature(0.3)
        .model(self.summary_model.as_deref());
        let summary = self.llm.complete(request).await?.trim().to_string();
        info!(
            "Summarized {} turns for {}",
            history.len(),
            user.phone_number
        );

        let farewell = match self
            .llm
            .complete(
                LlmRequest::new(prompts::EXIT_SYSTEM, prompts::exit_prompt(message, &summary))
                    .max_tokens(100),
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => responses::FAREWELL_RESPONSE.to_string(),
            Err(e) => {
                warn!("Farewell generation failed, using the standard text: {}", e);
                responses::FAREWELL_RESPONSE.to_string()
            }
        };

        Ok(ExitOutcome { summary, farewell })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_confirm_exit_reads_first_word() {
        let llm = Arc::new(ScriptedLlm::replying("No."));
        let advisor = ExitAdvisor::new(llm.clone(), Some("ft:exit-model".into()));
        assert!(!advisor.confirm_exit("not interested in nights, any day shifts?", &[]).await);

        let requests = llm.requests();
        assert_eq!(requests[0].model.as_deref(), Some("ft:exit-model"));
        assert_eq!(requests[0].max_tokens, 10);

        let advisor = ExitAdvisor::new(Arc::new(ScriptedLlm::replying("yes")), None);
        assert!(advisor.confirm_exit("bye", &[]).await);
        let advisor = ExitAdvisor::new(Arc::new(ScriptedLlm::failing()), None);
        assert!(advisor.confirm_exit("bye", &[]).await);
    }
}
