// Post text cleanup
use regex::Regex;
use std::sync::OnceLock;

fn handle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^@\w+").expect("valid handle pattern"))
}

fn short_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://t\.co/\w+").expect("valid url pattern"))
}

fn spaces_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace pattern"))
}

/// Normalize post text.
///
/// With `clean == false` the text is returned unchanged. Otherwise leading
/// `@handle` mentions and `t.co` short links are removed until none remain,
/// the result is trimmed and runs of spaces are collapsed. Applying it twice
/// gives the same result as applying it once.
pub fn normalize(text: Option<&str>, clean: bool) -> Option<String> {
    let text = text?;

    if !clean {
        return Some(text.to_string());
    }

    let mut out = text.trim().to_string();

    loop {
        let stripped = strip_once(&out);
        if stripped == out {
            break;
        }
        out = stripped;
    }

    Some(spaces_pattern().replace_all(&out, " ").into_owned())
}

fn strip_once(text: &str) -> String {
    let without_urls = short_url_pattern().replace_all(text, "");
    let trimmed = without_urls.trim();
    handle_pattern().replace(trimmed, "").trim().to_string()
}

/// Length in characters, as used by the min/max character bounds
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
