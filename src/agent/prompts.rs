use once_cell::sync::Lazy;
use std::fmt::Write;

static TIMEZONE: Lazy<String> =
    Lazy::new(|| iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string()));

pub const PERSONA: &str = "You are Amelia AI, a recruitment assistant at Tech Company, \
                           talking to job candidates over SMS.";

pub const ROUTER_SYSTEM: &str = "You are Amelia AI, a recruitment assistant at Tech Company.\n\
     Analyze the candidate's latest message and decide the next action.\n\n\
     Available actions:\n\
     1. \"continue\" - answer questions, share job information, or keep the conversation going\n\
     2. \"schedule\" - the candidate wants to schedule, reschedule or cancel an interview, \
     agrees to schedule (\"yes\", \"ok\", \"sure\", \"sounds good\"), or asks for other time slots\n\
     3. \"end\" - the candidate is not interested, says goodbye, or wants to stop\n\n\
     Respond with ONLY the action name: continue, schedule, or end.\n\n\
     Examples:\n\
     \"yes, let's go ahead\" -> schedule\n\
     \"any other time slots available?\" -> schedule\n\
     \"tell me more about the role\" -> continue\n\
     \"I'm not interested\" -> end\n\
     \"Ok, thank you, see you on Monday\" -> end";

pub const INFO_SYSTEM: &str = "You are an Info Advisor for a job candidate SMS chatbot. You:\n\
     - answer questions about open positions using only the provided job information\n\
     - give accurate, concise facts about requirements, benefits and company culture\n\
     - stay enthusiastic and professional\n\
     - help candidates see which position suits them\n\n\
     Keep replies brief (2-4 sentences, SMS style). Never mention positions that are not in \
     the provided information. Close by inviting the candidate to schedule an interview, \
     e.g. \"Would you like to schedule an interview to learn more?\", without being pushy.";

pub const SLOT_DECISION_SYSTEM: &str = "You are a scheduling assistant that matches a candidate's \
     reply to interview slots that were offered to them. Respond with JSON only, no prose:\n\
     {\"decision\": \"book\" | \"more\" | \"undecided\", \"slot_id\": <id or null>}\n\
     - \"book\" when the reply clearly picks one of the offered slots; set slot_id to its id\n\
     - \"more\" when the candidate rejects the offered times or asks for other options\n\
     - \"undecided\" otherwise";

pub const POST_SCHEDULING_SYSTEM: &str = "You are Amelia AI, a recruitment assistant at Tech \
     Company. A candidate just booked an interview. Confirm the details, mention that the \
     recruiter will follow up with next steps, thank them, and ask if they need anything else. \
     Two or three conversational sentences, SMS style.";

pub const SUMMARY_SYSTEM: &str = "You are a professional recruiter creating conversation \
     summaries. Be concise but comprehensive.";

pub const EXIT_SYSTEM: &str = "You are an Exit Advisor for a job candidate SMS chatbot. \
     Write polite, professional goodbyes: thank the candidate for their time, leave the door \
     open for future contact and wish them well in their job search. Keep it to two sentences.";

pub const EXIT_CONFIRM_SYSTEM: &str = "You decide whether a job candidate wants to end an SMS \
     conversation. Answer with one word: yes or no.";

pub fn router_prompt(message: &str, history: &str) -> String {
    let mut prompt = String::with_capacity(message.len() + history.len() + 64);
    if !history.is_empty() {
        let _ = write!(prompt, "Recent conversation:\n{}\n\n", history);
    }
    let _ = write!(prompt, "Candidate message: \"{}\"\n\nAction:", message);
    prompt
}

pub fn info_prompt(
    message: &str,
    job_interest: Option<&str>,
    knowledge: &str,
    summary: &str,
    history: &str,
) -> String {
    let mut prompt = String::with_capacity(1024 + knowledge.len() + history.len());
    let _ = write!(prompt, "{}\n\nCandidate's question: \"{}\"\n\n", PERSONA, message);
    if let Some(position) = job_interest {
        let _ = write!(prompt, "The candidate is interested in: {}\n\n", position);
    }
    prompt.push_str("Relevant job information:\n");
    if knowledge.is_empty() {
        prompt.push_str("(no matching job information found)\n");
    } else {
        prompt.push_str(knowledge);
        prompt.push('\n');
    }
    if !summary.is_empty() {
        let _ = write!(prompt, "\nSummary of earlier conversations: {}\n", summary);
    }
    if !history.is_empty() {
        let _ = write!(prompt, "\nRecent conversation:\n{}\n", history);
    }
    prompt.push_str(
        "\nAnswer in 2-3 sentences, using only the job information above, and end by offering \
         to schedule an interview.",
    );
    prompt
}

pub fn slot_decision_prompt(message: &str, offered: &str, history: &str) -> String {
    let now = chrono::Local::now();
    let mut prompt = String::with_capacity(512 + offered.len() + history.len());
    let _ = write!(
        prompt,
        "Today is {} ({}).\n\nOffered slots:\n{}\n",
        now.format("%A, %Y-%m-%d"),
        *TIMEZONE,
        offered
    );
    if !history.is_empty() {
        let _ = write!(prompt, "\nRecent conversation:\n{}\n", history);
    }
    let _ = write!(prompt, "\nCandidate reply: \"{}\"\n\nJSON:", message);
    prompt
}

pub fn post_scheduling_prompt(position: &str, slot: &str, recruiter_phone: &str) -> String {
    format!(
        "The candidate has scheduled an interview for {} at {}. \
         The recruiter's phone number is {}.",
        position, slot, recruiter_phone
    )
}

pub fn summary_prompt(phone_number: &str, previous_summary: &str, transcript: &str) -> String {
    let previous = if previous_summary.is_empty() {
        "No previous conversation"
    } else {
        previous_summary
    };
    format!(
        "Create a comprehensive summary of this job candidate conversation.\n\n\
         Phone Number: {}\n\
         Previous Summary: {}\n\n\
         Current Conversation:\n{}\n\n\
         Include:\n\
         1. Candidate's job interests and preferences\n\
         2. Key questions asked and information provided\n\
         3. Candidate's level of interest and engagement\n\
         4. Any specific requirements or concerns mentioned\n\
         5. Overall assessment of candidate fit\n\
         6. Next steps or recommendations\n\n\
         Summary:",
        phone_number, previous, transcript
    )
}

pub fn exit_prompt(message: &str, summary: &str) -> String {
    format!(
        "The candidate wants to end the conversation.\n\n\
         Candidate message: \"{}\"\n\
         Conversation summary: {}\n\n\
         Exit message:",
        message, summary
    )
}

pub fn exit_confirm_prompt(message: &str, history: &str) -> String {
    format!(
        "Does the candidate want to end the conversation?\n\n\
         Candidate message: \"{}\"\n\
         Recent conversation:\n{}\n\n\
         Signs they want to stop: a goodbye, saying they are not interested, asking to stop \
         or end the chat. A question or a request for more information means no.\n\n\
         Answer yes or no:",
        message,
        if history.is_empty() { "(none)" } else { history }
    )
}
