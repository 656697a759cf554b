use crate::utils::split_message;
use quick_xml::escape::escape;

/// Longest body Twilio accepts in one `<Message>`.
pub const SMS_SEGMENT_CHARS: usize = 1600;

/// Renders a messaging response with one `<Message>` per segment.
pub fn render(reply: &str) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    for segment in split_message(reply, SMS_SEGMENT_CHARS)
        .iter()
        .filter(|s| !s.is_empty())
    {
        xml.push_str("<Message>");
        xml.push_str(&escape(segment.as_str()));
        xml.push_str("</Message>");
    }
    xml.push_str("</Response>");
    xml
}
