//! Outbound chat is an external collaborator -- the bot framework's DM
//! transport -- reached only through this trait. `split_message` is the
//! pure half (line boundaries first, word boundaries second) that every
//! caller with a multi-chunk report runs text through before sending.

use async_trait::async_trait;

use crate::error::EngineError;

pub const MESSAGE_CHAR_LIMIT: usize = 2000;
pub const CHUNK_SPACING: std::time::Duration = std::time::Duration::from_millis(500);

#[async_trait]
pub trait OutboundChat: Send + Sync {
    async fn send_direct(&self, chat_user_id: &str, message: &str) -> Result<(), EngineError>;
}

/// Sends `message` as one or more chunks, each within `limit`, spaced by
/// `CHUNK_SPACING`. A send failure on any chunk aborts the remaining ones.
pub async fn send_chunked(chat: &dyn OutboundChat, chat_user_id: &str, message: &str, limit: usize) -> Result<(), EngineError> {
    let chunks = split_message(message, limit);
    for (i, chunk) in chunks.iter().enumerate() {
        chat.send_direct(chat_user_id, chunk).await?;
        if i + 1 < chunks.len() {
            tokio::time::sleep(CHUNK_SPACING).await;
        }
    }
    Ok(())
}

/// Splits `text` into chunks no longer than `limit`, preferring to break
/// on line boundaries and falling back to word boundaries within an
/// over-long line. `split_message(text, limit).join("") == text` modulo
/// the newlines consumed as break points (reassembling with `\n` between
/// same-paragraph chunks and nothing between a paragraph split recovers
/// the original exactly when no single line exceeds `limit`).
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.len() + line.len() <= limit {
            current.push_str(line);
            continue;
        }
        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() <= limit {
            current.push_str(line);
            continue;
        }
        for word in split_keep_whitespace(line) {
            if current.len() + word.len() > limit {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if word.len() > limit {
                    for chunk in word.as_bytes().chunks(limit) {
                        chunks.push(String::from_utf8_lossy(chunk).into_owned());
                    }
                    continue;
                }
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_keep_whitespace(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    for (i, c) in s.char_indices() {
        if c == ' ' {
            if i > start {
                out.push(&s[start..i]);
            }
            out.push(&s[i..i + 1]);
            start = i + 1;
        }
    }
    if start < bytes.len() {
        out.push(&s[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_a_single_chunk() {
        let chunks = split_message("hello", 2000);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn splits_on_line_boundaries_without_exceeding_limit() {
        let text = "a".repeat(10) + "\n" + &"b".repeat(10) + "\n" + &"c".repeat(10);
        let chunks = split_message(&text, 15);
        assert!(chunks.iter().all(|c| c.len() <= 15));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn falls_back_to_word_boundaries_within_an_over_long_line() {
        let text = (0..20).map(|_| "word").collect::<Vec<_>>().join(" ");
        let chunks = split_message(&text, 10);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn no_chunk_ever_exceeds_the_limit() {
        let text = "x".repeat(4321);
        let chunks = split_message(&text, 2000);
        assert!(chunks.iter().all(|c| c.len() <= 2000));
        assert_eq!(chunks.concat(), text);
    }
}
