use crate::positions::detect_position;
use crate::utils::split_message;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

pub const MAX_CHUNK_CHARS: usize = 800;
const ALL_POSITIONS: &str = "All Positions";
const UNKNOWN_POSITION: &str = "Unknown Position";

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub position: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub position: String,
    pub text: String,
}

impl Chunk {
    pub fn format_for_prompt(&self) -> String {
        format!("[{}] {}", self.position, self.text)
    }
}

const GENERIC_DOCUMENTS: [(&str, &str); 3] = [
    (
        "generic:benefits",
        "General Benefits and Perks:\n\
         1. Competitive salary based on experience\n\
         2. Comprehensive health, dental, and vision insurance\n\
         3. 401(k) with company matching\n\
         4. Flexible work hours and remote work options\n\
         5. Professional development budget\n\
         6. Unlimited PTO and paid holidays\n\
         7. Stock options and equity participation\n\
         8. Modern tech stack and development tools",
    ),
    (
        "generic:interview_process",
        "General Interview Process:\n\
         1. Initial screening call with HR (30 minutes)\n\
         2. Technical assessment with a take-home coding project (1-2 days)\n\
         3. Technical interview with senior team members (1 hour)\n\
         4. System design and architecture discussion (1 hour)\n\
         5. Final interview with hiring manager (45 minutes)\n\
         6. Reference checks and background verification\n\
         7. Offer discussion and negotiation",
    ),
    (
        "generic:company_info",
        "General Company Information:\n\
         Fast-growing technology company focused on innovation. Collaborative, remote-first \
         culture with emphasis on work-life balance. Team members have autonomy to make \
         technical decisions. Values continuous learning, open communication, and innovation. \
         Emphasis on delivering high-quality, scalable solutions. Diverse and inclusive \
         workplace environment.",
    ),
];

pub fn generic_documents() -> Vec<SourceDocument> {
    GENERIC_DOCUMENTS
        .iter()
        .map(|(source, text)| SourceDocument {
            source: source.to_string(),
            position: ALL_POSITIONS.to_string(),
            text: text.to_string(),
        })
        .collect()
}

/// Loads every job description under `dir` (pdf, txt, md), sorted by file name,
/// followed by the built-in generic documents.
pub fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::new();

    if dir.is_dir() {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read documents dir: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase);
            let text = match extension.as_deref() {
                Some("pdf") => match pdf_extract::extract_text(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Skipping unreadable PDF {}: {}", name, e);
                        continue;
                    }
                },
                Some("txt") | Some("md") => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read document: {}", path.display()))?,
                _ => continue,
            };

            let position = detect_position(name).unwrap_or(UNKNOWN_POSITION);
            info!("Loaded job description {} ({})", name, position);
            documents.push(SourceDocument {
                source: name.to_string(),
                position: position.to_string(),
                text,
            });
        }
    } else {
        warn!(
            "Documents dir {} not found, indexing generic information only",
            dir.display()
        );
    }

    documents.extend(generic_documents());
    Ok(documents)
}

/// Packs blank-line separated paragraphs into chunks of at most `max_chars`.
pub fn chunk_documents(documents: &[SourceDocument], max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        let mut current = String::new();
        for paragraph in paragraphs(&doc.text) {
            if !current.is_empty() && current.len() + 2 + paragraph.len() > max_chars {
                chunks.push(chunk(doc, std::mem::take(&mut current)));
            }
            if paragraph.len() > max_chars {
                for piece in split_message(&paragraph, max_chars) {
                    chunks.push(chunk(doc, piece.trim().to_string()));
                }
                continue;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&paragraph);
        }
        if !current.is_empty() {
            chunks.push(chunk(doc, current));
        }
    }
    chunks
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !lines.is_empty() {
                out.push(lines.join("\n"));
                lines.clear();
            }
        } else {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        out.push(lines.join("\n"));
    }
    out
}

fn chunk(doc: &SourceDocument, text: String) -> Chunk {
    Chunk {
        source: doc.source.clone(),
        position: doc.position.clone(),
        text,
    }
}
