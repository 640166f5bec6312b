//! Small text helpers shared by the notifier, the reports and the logs
//!
//! # Examples
//!
//! ```
//! use manga_reader_bot::helpers::{html_escape, truncate};
//!
//! assert_eq!(html_escape("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
//! assert_eq!(truncate("глава", 3), "гла");
//! ```

/// Cut a string to at most `max_chars` characters, on a char boundary
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Escape text for Telegram's HTML parse mode
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Name of an HTML tag token and whether it closes, `None` for anything else
fn tag_name(token: &str) -> Option<(bool, &str)> {
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name = inner.split(|c: char| c.is_whitespace() || c == '/').next()?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((closing, name))
}

/// Cut Telegram HTML to at most `max_chars` characters without splitting a
/// tag or an entity. Tags left open by the cut are closed, within the limit.
pub fn truncate_html(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    let mut open: Vec<&str> = Vec::new();
    let mut closers = 0;
    let mut rest = s;

    while let Some(first) = rest.chars().next() {
        let len = match first {
            '<' => rest.find('>').map(|i| i + 1).unwrap_or(1),
            '&' => rest
                .bytes()
                .take(10)
                .position(|b| b == b';')
                .map(|i| i + 1)
                .unwrap_or(1),
            c => c.len_utf8(),
        };
        let (token, tail) = rest.split_at(len);
        let chars = token.chars().count();

        match tag_name(token) {
            Some((false, name)) => {
                if used + chars + closers + name.len() + 3 > max_chars {
                    break;
                }
                open.push(name);
                closers += name.len() + 3;
            }
            Some((true, name)) if open.last() == Some(&name) => {
                let remaining = closers - (name.len() + 3);
                if used + chars + remaining > max_chars {
                    break;
                }
                open.pop();
                closers = remaining;
            }
            _ => {
                if used + chars + closers > max_chars {
                    break;
                }
            }
        }

        out.push_str(token);
        used += chars;
        rest = tail;
    }

    for name in open.iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}

/// Last path segment of a URL or path, ignoring query, fragment and trailing slashes
pub fn last_segment(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("Ошибка загрузки", 6), "Ошибка");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(html_escape(r#"class="x""#), "class=&quot;x&quot;");
    }

    #[test]
    fn test_truncate_html_keeps_markup_valid() {
        let text = format!("<b>Error</b>\n<pre>{}</pre>", "&lt;div&gt;".repeat(50));
        let cut = truncate_html(&text, 40);
        assert_eq!(cut, "<b>Error</b>\n<pre>&lt;div&gt;&lt;di</pre>");
        assert_eq!(cut.chars().count(), 40);

        let short = "<i>ok</i> &amp; fine";
        assert_eq!(truncate_html(short, 100), short);
    }

    #[test]
    fn test_truncate_html_never_splits_entities() {
        let text = "&amp;".repeat(10);
        for max in 0..text.len() {
            let cut = truncate_html(&text, max);
            assert_eq!(cut.len() % 5, 0, "split entity at {}: {}", max, cut);
            assert!(cut.len() <= max);
        }
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("https://mangabuff.ru/manga/one-piece"), Some("one-piece"));
        assert_eq!(last_segment("/manga/one-piece/"), Some("one-piece"));
        assert_eq!(last_segment("/manga/naruto?page=2#top"), Some("naruto"));
        assert_eq!(last_segment("/"), None);
    }
}
