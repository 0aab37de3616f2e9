use std::borrow::Cow;

use regex::Regex;

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";
/// Length of the ellipsis in characters
const ELLIPSIS_LEN: usize = 3;

/// Truncates a string to at most `max_length` characters.
///
/// If truncation is necessary, the result ends with "..." and its total
/// length, ellipsis included, is exactly `max_length` characters. Strings at
/// or under the limit are returned unchanged and borrowed.
///
/// Lengths are counted in `char`s, so multi-byte text is never split
/// mid-codepoint.
///
/// # Edge Case Behavior
///
/// For limits too small to hold a character plus the ellipsis (0-3), the
/// first `max_length` characters are returned without an ellipsis.
///
/// # Examples
///
/// ```
/// use rss_feed::util::trim;
///
/// assert_eq!(trim("Short", 10), "Short");
/// assert_eq!(trim("Hello World", 8), "Hello...");
/// assert_eq!(trim("Test", 2), "Te");
/// ```
pub fn trim(original: &str, max_length: usize) -> Cow<'_, str> {
    // Find the byte offset of the (max_length + 1)th char; if there is none the string fits
    let Some((overflow_at, _)) = original.char_indices().nth(max_length) else {
        return Cow::Borrowed(original);
    };

    if max_length <= ELLIPSIS_LEN {
        return Cow::Owned(original[..overflow_at].to_owned());
    }

    let keep = max_length - ELLIPSIS_LEN;
    let cut = original
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(original.len());

    Cow::Owned(format!("{}{}", &original[..cut], ELLIPSIS))
}

/// Recovers the value of `attribute="value"` from a raw markup fragment.
///
/// Single-pass pattern search: the first occurrence wins and the surrounding
/// markup is not validated. Returns an empty string when the attribute is
/// absent. This is a fallback for fragments that cannot be parsed
/// structurally (HTML embedded in a description, malformed enclosures).
///
/// # Examples
///
/// ```
/// use rss_feed::util::extract_attribute;
///
/// assert_eq!(extract_attribute(r#"<foo bar="baz" qux="zap">"#, "bar"), "baz");
/// assert_eq!(extract_attribute(r#"<foo bar="baz">"#, "missing"), "");
/// ```
pub fn extract_attribute(raw: &str, attribute: &str) -> String {
    if attribute.is_empty() {
        return String::new();
    }

    let pattern = format!(r#"{}="(.*?)""#, regex::escape(attribute));
    let Ok(re) = Regex::new(&pattern) else {
        return String::new();
    };

    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .unwrap_or_default()
}

fn is_stripped_control(c: char) -> bool {
    (c.is_control() && c != '\t' && c != '\n' && c != '\r') || c == '\u{feff}'
}

/// SEC-001: Strip control characters and ANSI escape sequences from feed text.
///
/// Feed titles and summaries are attacker-controlled; anything that reaches a
/// terminal or log must not carry escape sequences. CSI (`ESC [ ... final`)
/// and OSC (`ESC ] ... BEL|ST`) sequences are removed whole, other control
/// characters individually. Tab, newline and carriage return are preserved.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            if !is_stripped_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes run until a final byte in 0x40..=0x7e
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\u{07}' {
                        break;
                    }
                    if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Sanitizes a feed text field: strips control characters and surrounding whitespace.
///
/// Returns `None` for text that is empty after cleaning, so optional fields
/// never hold blank strings.
pub fn clean_text(s: &str) -> Option<String> {
    let stripped = strip_control_chars(s);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
