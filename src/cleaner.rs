//! Post-processing of generated messages
//!
//! Models regularly leave artifacts behind: a stray closing quote, a
//! sentence cut off by the token limit, piles of blank lines.

use std::sync::OnceLock;

use fancy_regex::Regex;

/// Signature of a message cleaning function
pub type Cleaner = fn(&str) -> String;

const SENTENCE_END: &[char] = &['.', '!', '?', '…'];

/// Marks that close an action, quote or aside
const CLOSING_MARKS: &[char] = &['"', '*', ')', '~'];

fn blank_lines() -> Option<&'static Regex> {
    static BLANK_LINES: OnceLock<Option<Regex>> = OnceLock::new();
    BLANK_LINES
        .get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").ok())
        .as_ref()
}

/// Clean a generated message
pub fn clean_message_content(content: &str) -> String {
    let mut text = content.trim().to_string();

    text = strip_unbalanced_quote(&text);
    text = trim_incomplete_sentence(&text);

    if let Some(re) = blank_lines() {
        text = re.replace_all(&text, "\n\n").into_owned();
    }

    text.trim().to_string()
}

/// Drop a lone double quote at either end when quotes don't pair up
fn strip_unbalanced_quote(text: &str) -> String {
    if text.matches('"').count() % 2 == 0 {
        return text.to_string();
    }
    if let Some(stripped) = text.strip_suffix('"') {
        return stripped.trim_end().to_string();
    }
    if let Some(stripped) = text.strip_prefix('"') {
        return stripped.trim_start().to_string();
    }
    text.to_string()
}

/// Cut a trailing fragment that was interrupted by the token limit. Text
/// ending on a terminator or closing mark, and text without any
/// terminator, is left alone. Closing marks right after the last
/// terminator are kept.
fn trim_incomplete_sentence(text: &str) -> String {
    if text.ends_with(SENTENCE_END) || text.ends_with(CLOSING_MARKS) {
        return text.to_string();
    }
    let Some(idx) = text.rfind(SENTENCE_END) else {
        return text.to_string();
    };

    let mut end = idx + text[idx..].chars().next().map_or(1, char::len_utf8);
    end += text[end..]
        .chars()
        .take_while(|c| CLOSING_MARKS.contains(c))
        .map(char::len_utf8)
        .sum::<usize>();
    text[..end].to_string()
}
