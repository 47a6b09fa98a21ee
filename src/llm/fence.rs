//! Extraction of SQL from markdown-formatted model output.
//!
//! Rules:
//! - no fence marker: the whole text, trimmed;
//! - otherwise the first fenced block wins and prose around it is dropped;
//! - a language tag right after the opening marker is dropped when it is a
//!   known SQL dialect tag, or when nothing else follows it on that line;
//! - the block ends at the next marker, or at the end of the text;
//! - a block with an empty body (a stray marker after the answer) yields the
//!   text before it instead.

const FENCE: &str = "```";

const SQL_TAGS: &[&str] = &["sql", "sqlite", "postgresql", "postgres", "psql", "mysql"];

pub fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find(FENCE) else {
        return text.trim().to_string();
    };

    let before = &text[..open];
    let rest = &text[open + FENCE.len()..];
    let body = match rest.find(FENCE) {
        Some(close) => &rest[..close],
        None => rest,
    };

    let body = drop_language_tag(body).trim();
    if body.is_empty() {
        before.trim().to_string()
    } else {
        body.to_string()
    }
}

fn drop_language_tag(body: &str) -> &str {
    let tag_len = body.find(char::is_whitespace).unwrap_or(body.len());
    let (tag, after) = body.split_at(tag_len);
    if tag.is_empty() {
        return body;
    }

    if SQL_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        return after;
    }

    if after
        .trim_start_matches([' ', '\t', '\r'])
        .starts_with('\n')
    {
        return after;
    }

    body
}
