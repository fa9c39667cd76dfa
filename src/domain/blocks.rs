//! Slack Block Kit model and the markdown-to-mrkdwn formatter.

use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use tracing::warn;

pub const MAX_BLOCKS: usize = 50;
pub const MAX_SECTION_CHARS: usize = 2900;
pub const MAX_HEADER_CHARS: usize = 150;
pub const TRUNCATION_SUFFIX: &str = "\n\n... (message truncated because it is too long)";
pub const DEFAULT_HEADER: &str = "📢 Notification";

const SECTION_DELIMITER: &str = "\n---\n";
const FOOTER_BLOCK_ID: &str = "notification-context";

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("Invalid bold regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##\s*(.*)$").expect("Invalid heading regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*-\s+").expect("Invalid bullet regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    PlainText,
    Mrkdwn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl TextObject {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::PlainText,
            text: text.into(),
            emoji: Some(true),
        }
    }

    fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: TextKind::Mrkdwn,
            text: text.into(),
            emoji: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Divider,
    Section {
        text: TextObject,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

impl Block {
    fn header(title: &str) -> Self {
        Block::Header {
            text: TextObject::plain(cap_chars(title, MAX_HEADER_CHARS)),
        }
    }

    fn section(text: impl Into<String>) -> Self {
        Block::Section {
            text: TextObject::mrkdwn(text),
        }
    }

    fn footer(sent_at: NaiveDateTime) -> Self {
        Block::Context {
            block_id: FOOTER_BLOCK_ID.to_string(),
            elements: vec![TextObject::mrkdwn(format!(
                "Sent at: {}",
                sent_at.format("%Y-%m-%d %H:%M:%S")
            ))],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Block::Header { text } | Block::Section { text } => Some(&text.text),
            Block::Context { elements, .. } => {
                elements.first().map(|element| element.text.as_str())
            }
            Block::Divider => None,
        }
    }
}

pub struct MessageFormatter;

impl MessageFormatter {
    pub fn format(title: &str, body: &str) -> Vec<Block> {
        Self::format_at(title, body, Local::now().naive_local())
    }

    /// Header, divider-separated sections, then a timestamp footer.
    ///
    /// Never fails: oversized input is truncated, and the result holds at most
    /// `MAX_BLOCKS` blocks.
    pub fn format_at(title: &str, body: &str, sent_at: NaiveDateTime) -> Vec<Block> {
        let title = title.trim();
        let title = if title.is_empty() { DEFAULT_HEADER } else { title };

        let mut blocks = vec![Block::header(title), Block::Divider];

        for section in body.split(SECTION_DELIMITER) {
            if blocks.len() >= MAX_BLOCKS - 2 {
                warn!("notification has too many sections, truncating message");
                blocks.push(Block::section(TRUNCATION_SUFFIX));
                break;
            }
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            blocks.push(Block::section(truncate_section(&to_mrkdwn(section))));
            blocks.push(Block::Divider);
        }

        if matches!(blocks.last(), Some(Block::Divider)) {
            blocks.pop();
        }
        blocks.push(Block::footer(sent_at));
        blocks
    }
}

/// Rewrites common markdown into Slack mrkdwn: bold, `##` headings, `-` bullets.
pub fn to_mrkdwn(text: &str) -> String {
    let text = BOLD_RE.replace_all(text, "*$1*");
    let text = HEADING_RE.replace_all(&text, "*$1*");
    BULLET_RE.replace_all(&text, "• ").into_owned()
}

pub fn truncate_section(text: &str) -> String {
    let length = text.chars().count();
    if length <= MAX_SECTION_CHARS {
        return text.to_string();
    }

    warn!(length, "notification section is too long, truncating");
    let keep = MAX_SECTION_CHARS - TRUNCATION_SUFFIX.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Cuts `text` to `max` characters, marking the cut with `...`.
pub fn cap_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(max.saturating_sub(3)).collect();
    capped.push_str("...");
    capped
}
