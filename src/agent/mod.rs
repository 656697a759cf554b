use crate::config::Config;
use crate::conversation::{ConversationError, Conversations, Role, Turn, UserRecord};
use crate::knowledge::KnowledgeIndex;
use crate::llm::{Llm, LlmError};
use crate::positions::detect_position;
use crate::schedule::{ScheduleError, ScheduleStore};
use crate::utils::normalize_phone;
use chrono::NaiveDate;
use exit::ExitAdvisor;
use info::InfoAdvisor;
pub use intent::Intent;
use scheduler::SchedulerAdvisor;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

mod exit;
mod info;
mod intent;
mod prompts;
mod responses;
mod scheduler;

const HISTORY_TURNS: usize = 10;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub reply: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub conversation_backend: &'static str,
    pub schedule_backend: &'static str,
    pub knowledge_chunks: usize,
    pub positions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub recruiter_phone: String,
    pub max_offer_dates: usize,
    pub summary_model: Option<String>,
}

impl From<&Config> for AgentSettings {
    fn from(config: &Config) -> Self {
        Self {
            recruiter_phone: config.scheduling.recruiter_phone.clone(),
            max_offer_dates: config.scheduling.max_offer_dates,
            summary_model: config.api.exit_model.clone(),
        }
    }
}

/// What an advisor sees of the current exchange.
pub struct AdvisorContext<'a> {
    pub message: &'a str,
    pub user: &'a UserRecord,
    pub history: &'a [Turn],
    pub today: NaiveDate,
}

impl AdvisorContext<'_> {
    pub fn phone_number(&self) -> &str {
        &self.user.phone_number
    }

    pub fn history_text(&self) -> String {
        self.history
            .iter()
            .map(Turn::format_for_context)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Routes each inbound message to the info, scheduling or exit advisor and
/// records the exchange.
pub struct MainAgent {
    llm: Arc<dyn Llm>,
    conversations: Arc<Conversations>,
    schedule: Arc<ScheduleStore>,
    knowledge: Arc<KnowledgeIndex>,
    info: InfoAdvisor,
    scheduler: SchedulerAdvisor,
    exit: ExitAdvisor,
}

impl MainAgent {
    pub fn new(
        llm: Arc<dyn Llm>,
        conversations: Arc<Conversations>,
        schedule: Arc<ScheduleStore>,
        knowledge: Arc<KnowledgeIndex>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            info: InfoAdvisor::new(llm.clone(), knowledge.clone()),
            scheduler: SchedulerAdvisor::new(
                llm.clone(),
                schedule.clone(),
                &settings.recruiter_phone,
                settings.max_offer_dates,
            ),
            exit: ExitAdvisor::new(llm.clone(), settings.summary_model),
            llm,
            conversations,
            schedule,
            knowledge,
        }
    }

    /// Never fails: any error is logged and answered with an apology, and
    /// nothing is written for that exchange.
    pub async fn process_message(&self, text: &str, phone_number: &str) -> Reply {
        let phone = normalize_phone(phone_number);
        match self.handle(text.trim(), &phone).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to handle message from {}: {}", phone, e);
                Reply {
                    reply: responses::ERROR_RESPONSE.to_string(),
                    intent: Intent::Unclassified,
                }
            }
        }
    }

    async fn handle(&self, text: &str, phone: &str) -> Result<Reply, AgentError> {
        let mut user = match self.conversations.find_user(phone).await? {
            Some(user) => user,
            None => {
                info!("New candidate {}", phone);
                UserRecord::new(phone)
            }
        };
        if let Some(position) = detect_position(text) {
            user.job_interest = Some(position.to_string());
        }
        let history = self.conversations.recent_turns(phone, HISTORY_TURNS).await?;

        let intent = match intent::classify(text, !user.offered_slots.is_empty()) {
            Intent::Unclassified => intent::escalate(self.llm.as_ref(), text, &history).await,
            Intent::Exit if !self.exit.confirm_exit(text, &history).await => {
                info!("Exit not confirmed for {}, answering as info", phone);
                Intent::Info
            }
            intent => intent,
        };
        info!("Message from {} routed to {}", phone, intent.as_str());

        let ctx = AdvisorContext {
            message: text,
            user: &user,
            history: &history,
            today: chrono::Local::now().date_naive(),
        };
        let reply = match intent {
            Intent::Schedule => {
                let outcome = self.scheduler.propose_or_book(&ctx).await?;
                user.offered_slots = outcome.offered_slots;
                user.offered_backend = outcome.offered_backend;
                outcome.reply
            }
            Intent::Exit => {
                let mut transcript = self.conversations.all_turns(phone).await?;
                transcript.push(Turn::new(phone, Role::User, text));
                let outcome = self.exit.summarize_and_close(&user, &transcript, text).await?;
                user.conversation_summary = outcome.summary;
                user.offered_slots.clear();
                user.offered_backend = None;
                outcome.farewell
            }
            Intent::Info | Intent::Unclassified => self.info.answer(text, &ctx).await?,
        };

        user.touch();
        self.conversations.save_exchange(&user, text, &reply).await?;
        Ok(Reply { reply, intent })
    }

    pub async fn status(&self) -> AgentStatus {
        AgentStatus {
            conversation_backend: self.conversations.backend_name().await,
            schedule_backend: self.schedule.backend_name().await,
            knowledge_chunks: self.knowledge.len(),
            positions: self.knowledge.positions(),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::embeddings::testing::HashingEmbedding;
    use crate::llm::testing::ScriptedLlm;
    use crate::schedule::SeedOptions;
    use tempfile::TempDir;

    pub struct Harness {
        pub agent: Arc<MainAgent>,
        pub llm: Arc<ScriptedLlm>,
        pub conversations: Arc<Conversations>,
        pub schedule: Arc<ScheduleStore>,
        _dir: TempDir,
    }

    pub async fn harness(llm: ScriptedLlm) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("python_developer.txt"),
            "Python Developer\n\nBuild backend services with Django and FastAPI.\n\n\
             Requirements: three years of Python experience.",
        )
        .unwrap();
        std::fs::write(
            docs.join("data_analyst.txt"),
            "Data Analyst\n\nBuild Tableau dashboards and stakeholder reports.",
        )
        .unwrap();

        let knowledge = KnowledgeIndex::open(
            &dir.path().join("index"),
            &docs,
            Arc::new(HashingEmbedding),
        )
        .await
        .unwrap();
        let schedule = Arc::new(
            ScheduleStore::connect(
                None,
                dir.path(),
                SeedOptions {
                    horizon_days: 30,
                    seed: Some(7),
                },
            )
            .await
            .unwrap(),
        );
        let conversations = Arc::new(Conversations::in_memory());
        let llm = Arc::new(llm);
        let agent = Arc::new(MainAgent::new(
            llm.clone(),
            conversations.clone(),
            schedule.clone(),
            knowledge,
            AgentSettings {
                recruiter_phone: "+1-555-0000".into(),
                max_offer_dates: 5,
                summary_model: None,
            },
        ));
        Harness {
            agent,
            llm,
            conversations,
            schedule,
            _dir: dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::harness;
    use super::*;
    use crate::llm::testing::ScriptedLlm;

    const PHONE: &str = "5551234567";

    fn today() -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    #[tokio::test]
    async fn test_new_phone_creates_one_record_and_two_turns() {
        let h = harness(ScriptedLlm::replying(
            "We offer health insurance and unlimited PTO. Would you like to schedule an interview?",
        ))
        .await;

        let reply = h
            .agent
            .process_message("What benefits do you offer?", "+1 (555) 123-4567")
            .await;
        assert_eq!(reply.intent, Intent::Info);
        assert!(reply.reply.contains("unlimited PTO"));

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.conversation_summary, "");
        assert!(user.job_interest.is_none());

        let turns = h.conversations.all_turns(PHONE).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "What benefits do you offer?");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, reply.reply);

        let stats = h.conversations.stats().await.unwrap();
        assert_eq!((stats.users, stats.turns), (1, 2));
    }

    #[tokio::test]
    async fn test_python_interest_is_recorded_and_grounds_answer() {
        let h = harness(ScriptedLlm::replying(
            "Our Python Developers build Django services. Want to schedule an interview?",
        ))
        .await;

        let reply = h
            .agent
            .process_message("I'm interested in Python Developer roles", PHONE)
            .await;
        assert_eq!(reply.intent, Intent::Info);

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.job_interest.as_deref(), Some("Python Developer"));

        let requests = h.llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, prompts::INFO_SYSTEM);
        assert!(requests[0].prompt.contains("[Python Developer]"));
        assert!(requests[0].prompt.contains("Django"));
        assert!(requests[0].prompt.contains("interested in: Python Developer"));
    }

    #[tokio::test]
    async fn test_llm_failure_answers_with_apology_and_writes_nothing() {
        let h = harness(ScriptedLlm::failing()).await;

        let reply = h
            .agent
            .process_message("What benefits do you offer?", PHONE)
            .await;
        assert_eq!(reply.reply, responses::ERROR_RESPONSE);

        assert!(h.conversations.find_user(PHONE).await.unwrap().is_none());
        assert_eq!(h.conversations.stats().await.unwrap().turns, 0);
    }

    #[tokio::test]
    async fn test_confirming_offered_slot_books_it() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::POST_SCHEDULING_SYSTEM {
                Ok("You're booked! The recruiter will be in touch.".into())
            } else {
                Ok("continue".into())
            }
        }))
        .await;

        let offer = h
            .agent
            .process_message("I'd like to schedule an interview", PHONE)
            .await;
        assert_eq!(offer.intent, Intent::Schedule);
        assert!(offer.reply.contains("available interview slots for Python Developer"));

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert!(!user.offered_slots.is_empty());
        let chosen = user.offered_slots[0];
        let before = h.schedule.stats().await.unwrap();

        let confirm = h.agent.process_message("option 1", PHONE).await;
        assert_eq!(confirm.intent, Intent::Schedule);
        assert_eq!(confirm.reply, "You're booked! The recruiter will be in touch.");

        let after = h.schedule.stats().await.unwrap();
        assert_eq!(after.bookings, before.bookings + 1);
        let booking = h.schedule.get_booking(PHONE).await.unwrap().unwrap();
        assert_eq!(booking.slot.id, chosen);
        assert_eq!(booking.recruiter_phone, "+1-555-0000");

        let remaining = h
            .schedule
            .available_slots("Python Developer", today(), &[], 60)
            .await
            .unwrap();
        assert!(remaining.iter().all(|s| s.id != chosen));

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert!(user.offered_slots.is_empty());
        assert_eq!(h.conversations.all_turns(PHONE).await.unwrap().len(), 4);

        let status = h.agent.process_message("When is my interview?", PHONE).await;
        assert!(status.reply.contains("is scheduled for"));

        let cancel = h.agent.process_message("Please cancel my interview", PHONE).await;
        assert!(cancel.reply.contains("has been cancelled"));
        assert!(h.schedule.get_booking(PHONE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slot_taken_by_another_candidate_offers_alternatives() {
        let h = harness(ScriptedLlm::replying("Booked!")).await;

        h.agent
            .process_message("I'd like to schedule an interview", PHONE)
            .await;
        let offered = h.conversations.find_user(PHONE).await.unwrap().unwrap().offered_slots;
        let taken = h.schedule.get_slots(&offered[..1]).await.unwrap().remove(0);
        h.schedule
            .book(taken.id, "5559876543", "+1-555-0000")
            .await
            .unwrap();

        let reply = h.agent.process_message("option 1", PHONE).await;
        assert_eq!(reply.intent, Intent::Schedule);
        assert!(reply.reply.starts_with(&format!(
            "Sorry, the {} slot is no longer available.",
            taken.label()
        )));
        assert!(reply.reply.contains("available interview slots"));
        assert!(h.schedule.get_booking(PHONE).await.unwrap().is_none());

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert!(!user.offered_slots.is_empty());
        assert!(!user.offered_slots.contains(&taken.id));
    }

    #[tokio::test]
    async fn test_offer_from_another_schedule_backend_is_made_again() {
        let h = harness(ScriptedLlm::replying("Booked!")).await;

        h.agent
            .process_message("I'd like to schedule an interview", PHONE)
            .await;
        let mut user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.offered_backend.as_deref(), Some("sqlite"));

        // Ids handed out by the primary server before a switch to the file.
        user.offered_backend = Some("postgres".into());
        h.conversations
            .save_exchange(&user, "I'd like to schedule an interview", "Here are the slots")
            .await
            .unwrap();

        let reply = h.agent.process_message("option 1", PHONE).await;
        assert_eq!(reply.intent, Intent::Schedule);
        assert!(reply.reply.contains("available interview slots"));
        assert!(h.schedule.get_booking(PHONE).await.unwrap().is_none());
        assert!(h.llm.requests().is_empty());

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.offered_backend.as_deref(), Some("sqlite"));
        assert!(!user.offered_slots.is_empty());
    }

    #[tokio::test]
    async fn test_slot_decision_from_model() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::SLOT_DECISION_SYSTEM {
                Ok(r#"{"decision": "more", "slot_id": null}"#.into())
            } else {
                Ok("ok".into())
            }
        }))
        .await;

        h.agent.process_message("Can I book an interview?", PHONE).await;
        let first = h.conversations.find_user(PHONE).await.unwrap().unwrap().offered_slots;
        let first_dates: Vec<NaiveDate> = h
            .schedule
            .get_slots(&first)
            .await
            .unwrap()
            .iter()
            .map(|s| s.date)
            .collect();

        let reply = h.agent.process_message("yes but in the evening", PHONE).await;
        assert_eq!(reply.intent, Intent::Schedule);
        assert!(h.schedule.get_booking(PHONE).await.unwrap().is_none());

        let second = h.conversations.find_user(PHONE).await.unwrap().unwrap().offered_slots;
        let second_slots = h.schedule.get_slots(&second).await.unwrap();
        assert!(second_slots.iter().all(|s| !first_dates.contains(&s.date)));
    }

    #[tokio::test]
    async fn test_exit_summarizes_and_keeps_history() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::SUMMARY_SYSTEM {
                Ok("Candidate asked about benefits and declined to continue.".into())
            } else if req.system == prompts::EXIT_SYSTEM {
                Ok("Thanks for your time, best of luck!".into())
            } else if req.system == prompts::EXIT_CONFIRM_SYSTEM {
                Ok("Yes".into())
            } else {
                Ok("We offer unlimited PTO.".into())
            }
        }))
        .await;

        h.agent.process_message("What benefits do you offer?", PHONE).await;
        let reply = h.agent.process_message("No thanks, goodbye", PHONE).await;
        assert_eq!(reply.intent, Intent::Exit);
        assert_eq!(reply.reply, "Thanks for your time, best of luck!");

        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(
            user.conversation_summary,
            "Candidate asked about benefits and declined to continue."
        );
        assert_eq!(h.conversations.all_turns(PHONE).await.unwrap().len(), 4);

        let summary_request = h
            .llm
            .requests()
            .into_iter()
            .find(|r| r.system == prompts::SUMMARY_SYSTEM)
            .unwrap();
        assert!(summary_request.prompt.contains("USER: What benefits do you offer?"));
        assert!(summary_request.prompt.contains("ASSISTANT: We offer unlimited PTO."));
        assert!(summary_request.prompt.contains("USER: No thanks, goodbye"));
        assert!(summary_request.prompt.contains("No previous conversation"));
    }

    #[tokio::test]
    async fn test_exit_farewell_falls_back_to_static_text() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::EXIT_SYSTEM {
                Err(LlmError::Timeout(30))
            } else if req.system == prompts::EXIT_CONFIRM_SYSTEM {
                Ok("yes".into())
            } else {
                Ok("Short summary.".into())
            }
        }))
        .await;

        let reply = h.agent.process_message("bye", PHONE).await;
        assert_eq!(reply.reply, responses::FAREWELL_RESPONSE);
        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.conversation_summary, "Short summary.");
    }

    #[tokio::test]
    async fn test_unconfirmed_exit_is_answered_as_info() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::EXIT_CONFIRM_SYSTEM {
                Ok("no".into())
            } else if req.system == prompts::INFO_SYSTEM {
                Ok("Happy to help. The role is hybrid.".into())
            } else {
                Ok("unexpected".into())
            }
        }))
        .await;

        let reply = h
            .agent
            .process_message("I'm not interested in relocating, is the role remote", PHONE)
            .await;
        assert_eq!(reply.intent, Intent::Info);
        assert_eq!(reply.reply, "Happy to help. The role is hybrid.");

        let systems: Vec<String> = h.llm.requests().into_iter().map(|r| r.system).collect();
        assert_eq!(systems, vec![prompts::EXIT_CONFIRM_SYSTEM, prompts::INFO_SYSTEM]);
        let user = h.conversations.find_user(PHONE).await.unwrap().unwrap();
        assert_eq!(user.conversation_summary, "");
    }

    #[tokio::test]
    async fn test_exit_stands_when_confirmation_fails() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::EXIT_CONFIRM_SYSTEM {
                Err(LlmError::Timeout(30))
            } else {
                Ok("Noted.".into())
            }
        }))
        .await;

        let reply = h.agent.process_message("goodbye", PHONE).await;
        assert_eq!(reply.intent, Intent::Exit);
        assert!(h.llm.requests()[0].prompt.contains("\"goodbye\""));
    }

    #[tokio::test]
    async fn test_unclassified_message_is_escalated() {
        let h = harness(ScriptedLlm::new(|req| {
            if req.system == prompts::ROUTER_SYSTEM {
                Ok("schedule".into())
            } else {
                Ok("unused".into())
            }
        }))
        .await;

        let reply = h.agent.process_message("alright then", PHONE).await;
        assert_eq!(reply.intent, Intent::Schedule);
        assert!(reply.reply.contains("available interview slots"));
        assert_eq!(h.llm.requests()[0].system, prompts::ROUTER_SYSTEM);
    }

    #[tokio::test]
    async fn test_status_reports_backends() {
        let h = harness(ScriptedLlm::replying("ok")).await;
        let status = h.agent.status().await;
        assert_eq!(status.conversation_backend, "memory");
        assert_eq!(status.schedule_backend, "sqlite");
        assert!(status.knowledge_chunks >= 5);
        assert!(status.positions.contains(&"Python Developer".to_string()));
    }
}
