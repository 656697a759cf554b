use super::prompts;
use crate::conversation::Turn;
use crate::llm::{Llm, LlmRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Info,
    Schedule,
    Exit,
    Unclassified,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Info => "info",
            Intent::Schedule => "schedule",
            Intent::Exit => "exit",
            Intent::Unclassified => "unclassified",
        }
    }
}

struct Rule {
    intent: Intent,
    needs_pending_offer: bool,
    pattern: Regex,
    unless: Option<Regex>,
}

impl Rule {
    fn new(intent: Intent, needs_pending_offer: bool, pattern: &str) -> Self {
        Self {
            intent,
            needs_pending_offer,
            pattern: Regex::new(pattern).expect("intent rule pattern"),
            unless: None,
        }
    }

    /// Skips the rule when `pattern` also matches.
    fn unless(mut self, pattern: &str) -> Self {
        self.unless = Some(Regex::new(pattern).expect("intent rule exception"));
        self
    }

    fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text) && !self.unless.as_ref().is_some_and(|u| u.is_match(text))
    }
}

// First match wins.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(
            Intent::Exit,
            false,
            r"(?i)^\s*(stop|quit|end)\s*[.!]*\s*$|\b(bye|goodbye|good bye|see you|not interested|no longer interested|no thanks|no thank you|unsubscribe|please stop|stop (texting|messaging|contacting)( me)?|end (the |this )?(conversation|chat))\b",
        ),
        // Questions about the interview itself, not about booking one.
        Rule::new(
            Intent::Info,
            false,
            r"(?i)\binterview (process|stages?|steps|rounds?|format|structure|questions?|panel)\b|^\s*(what|how|who|which|tell me)\b.*\binterview|\binterview\w*\b.*\?",
        )
        .unless(
            r"(?i)\b(schedul\w*|reschedul\w*|book\w*|cancel\w*|slots?|availab\w*|appointments?|times?|dates?|when|my interview)\b",
        ),
        Rule::new(
            Intent::Schedule,
            false,
            r"(?i)\b(schedul\w*|reschedul\w*|interviews?|book\w*|appointments?|time ?slots?|slots?|availability|available (times?|dates?|days?)|cancel\w*|(other|another|different) (times?|dates?|days?|options?))\b",
        ),
        Rule::new(
            Intent::Schedule,
            true,
            r"(?i)^\s*(yes|yeah|yep|yup|ok|okay|sure|sounds good|that works|works for me|perfect|great|let'?s do it|go ahead|the first|the second|the last)\b|\boption\s*#?\d+\b|^\s*#?\d{1,2}\s*$|\b\d{1,2}:\d{2}\b|\b\d{1,2}\s*(am|pm)\b|\b\d{4}-\d{2}-\d{2}\b|\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow)\b|\bworks\b",
        ),
        Rule::new(
            Intent::Info,
            false,
            r"(?i)\?|\b(what|which|how|who|where|why|when|tell me|more about|roles?|positions?|jobs?|openings?|salary|pay|compensation|benefits?|perks?|pto|insurance|requirements?|qualifications?|skills?|experience|company|culture|team|remote|hybrid|developer|engineer|analyst|scientist|manager|interested in|looking for|apply|application)\b",
        ),
    ]
});

/// Rule-table classification. `Unclassified` means the caller should escalate.
pub fn classify(text: &str, has_pending_offer: bool) -> Intent {
    RULES
        .iter()
        .filter(|rule| has_pending_offer || !rule.needs_pending_offer)
        .find(|rule| rule.matches(text))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Unclassified)
}

/// Maps the model's one-word routing answer to an intent.
pub fn parse_action(answer: &str) -> Option<Intent> {
    let word = answer
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())?
        .to_lowercase();
    match word.as_str() {
        "continue" => Some(Intent::Info),
        "schedule" => Some(Intent::Schedule),
        "end" => Some(Intent::Exit),
        _ => None,
    }
}

/// Asks the model to route a message the rule table could not place.
/// Any failure resolves to `Info`.
pub async fn escalate(llm: &dyn Llm, text: &str, history: &[Turn]) -> Intent {
    let history = history
        .iter()
        .map(Turn::format_for_context)
        .collect::<Vec<_>>()
        .join("\n");
    let request = LlmRequest::new(prompts::ROUTER_SYSTEM, prompts::router_prompt(text, &history))
        .max_tokens(10)
        .temperature(0.0);

    match llm.complete(request).await {
        Ok(answer) => match parse_action(&answer) {
            Some(intent) => {
                info!("Escalated intent: {}", intent.as_str());
                intent
            }
            None => {
                warn!("Unrecognized routing answer {:?}, treating as info", answer);
                Intent::Info
            }
        },
        Err(e) => {
            warn!("Intent escalation failed: {}", e);
            Intent::Info
        }
    }
}
