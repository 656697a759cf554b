//! Keyword table mapping free text and document file names to position titles.

pub const DEFAULT_POSITION: &str = "Python Developer";

/// Positions offered by the interview calendar.
pub const SCHEDULED_POSITIONS: [&str; 4] =
    ["Python Developer", "SQL Developer", "Data Analyst", "ML Engineer"];

// Longer phrases first so "data scientist" wins over "data".
const POSITION_KEYWORDS: &[(&str, &str)] = &[
    ("python", "Python Developer"),
    ("sql", "SQL Developer"),
    ("data analyst", "Data Analyst"),
    ("data_analyst", "Data Analyst"),
    ("analyst", "Data Analyst"),
    ("machine learning", "ML Engineer"),
    ("ml engineer", "ML Engineer"),
    ("ml_engineer", "ML Engineer"),
    ("data scientist", "Data Scientist"),
    ("data_scientist", "Data Scientist"),
    ("data engineer", "Data Engineer"),
    ("data_engineer", "Data Engineer"),
    ("java", "Java Developer"),
    ("frontend", "Frontend Developer"),
    ("front-end", "Frontend Developer"),
    ("backend", "Backend Developer"),
    ("back-end", "Backend Developer"),
    ("fullstack", "Full Stack Developer"),
    ("full stack", "Full Stack Developer"),
    ("devops", "DevOps Engineer"),
    ("qa engineer", "QA Engineer"),
    ("product manager", "Product Manager"),
    ("project manager", "Project Manager"),
];

/// Finds the first position whose keyword appears in `text`.
pub fn detect_position(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    POSITION_KEYWORDS
        .iter()
        .find(|(keyword, _)| contains_word(&lower, keyword))
        .map(|(_, title)| *title)
}

// "sql" must not match inside "nosqlite", but "python" still matches "python3".
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphabetic())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_python_from_sentence() {
        assert_eq!(
            detect_position("I'm interested in Python Developer roles"),
            Some("Python Developer")
        );
    }

    #[test]
    fn test_detects_from_file_name() {
        assert_eq!(
            detect_position("senior_data_scientist_jd.pdf"),
            Some("Data Scientist")
        );
        assert_eq!(detect_position("ML_Engineer.pdf"), Some("ML Engineer"));
    }

    #[test]
    fn test_requires_word_start() {
        assert_eq!(detect_position("I use nosql stores"), None);
        assert_eq!(detect_position("Do you hire for SQL?"), Some("SQL Developer"));
    }

    #[test]
    fn test_no_position() {
        assert_eq!(detect_position("hello there"), None);
    }
}
