//! Operator-facing message texts (Telegram HTML)

use crate::helpers::{html_escape, truncate_html};
use crate::models::ChapterRef;
use crate::notifier::MAX_TEXT_CHARS;
use crate::pacing::ReadingRate;
use crate::state::ResumeState;

/// Room kept for the identity footer the notifier appends
const FOOTER_RESERVE: usize = 256;
const MAX_REPORT_CHARS: usize = MAX_TEXT_CHARS - FOOTER_RESERVE;

fn title_line(state: &ResumeState) -> String {
    format!(
        "📚 Title: {}",
        state.current_manga.as_deref().map(html_escape).unwrap_or_else(|| "none".to_string())
    )
}

fn position_line(state: &ResumeState) -> String {
    format!("📖 Volume/Chapter: {}/{}", state.current_volume, state.current_chapter)
}

/// Fit the escaped error into what the wrapper and context lines leave over
fn wrap_error(message: &str, render: impl Fn(&str) -> String) -> String {
    let frame = render("").chars().count();
    let body = truncate_html(&html_escape(message), MAX_REPORT_CHARS.saturating_sub(frame));
    render(&body)
}

/// Error mirrored to the operator with the current reading position
pub fn error_message(message: &str, state: &ResumeState) -> String {
    let (title, position) = (title_line(state), position_line(state));
    wrap_error(message, |body| {
        format!("🚨 <b>MangaBot Error</b>\n<pre>{}</pre>\n{}\n{}", body, title, position)
    })
}

/// Top-level failure that ends the run
pub fn critical_message(message: &str, state: &ResumeState) -> String {
    let (title, position) = (title_line(state), position_line(state));
    wrap_error(message, |body| {
        format!("💥 <b>Critical error!</b>\n<code>{}</code>\n\n{}\n{}", body, title, position)
    })
}

pub fn status_message(state: &ResumeState, last_error: Option<&str>) -> String {
    format!(
        "📊 <b>MangaBot Status Report</b>\n\
         • Current title: {}\n\
         • Volume/Chapter: {}/{}\n\
         • Chapters read: {}\n\
         • Last error: {}",
        state.current_manga.as_deref().map(html_escape).unwrap_or_else(|| "none".to_string()),
        state.current_volume,
        state.current_chapter,
        state.processed_count(),
        last_error.map(html_escape).unwrap_or_else(|| "none".to_string())
    )
}

pub fn item_started(slug: &str, rate: ReadingRate) -> String {
    format!(
        "📚 Starting <b>{}</b>\n⚡ Speed: {} chapters/hour",
        html_escape(slug),
        rate.per_hour()
    )
}

pub fn item_finished(slug: &str, read: usize) -> String {
    format!("🏁 Finished <b>{}</b>\n📊 Chapters read: {}", html_escape(slug), read)
}

pub fn new_chapters(slug: &str, before: usize, after: usize) -> String {
    format!(
        "🆕 New chapters found for <b>{}</b> ({} -> {})",
        html_escape(slug),
        before,
        after
    )
}

pub fn chapter_unavailable(slug: &str, chapter: ChapterRef) -> String {
    format!("Chapter unavailable or removed: {} {}", slug, chapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_on(slug: &str) -> ResumeState {
        let mut state = ResumeState::default();
        state.select(slug);
        state.set_position(ChapterRef::new(2, 14));
        state
    }

    #[test]
    fn test_error_message_has_context_and_escapes() {
        let text = error_message("expected <div> & got nothing", &state_on("solo-leveling"));
        assert!(text.starts_with("🚨 <b>MangaBot Error</b>"));
        assert!(text.contains("<pre>expected &lt;div&gt; &amp; got nothing</pre>"));
        assert!(text.contains("📚 Title: solo-leveling"));
        assert!(text.contains("📖 Volume/Chapter: 2/14"));
    }

    #[test]
    fn test_long_error_message_keeps_markup_and_context() {
        let long = "<div>".repeat(900);
        let text = error_message(&long, &state_on("berserk"));
        assert!(text.chars().count() <= MAX_REPORT_CHARS);
        let start = text.find("<pre>").unwrap() + "<pre>".len();
        let end = text.find("</pre>").unwrap();
        let body = &text[start..end];
        assert!(html_escape(&long).starts_with(body));
        let last_amp = body.rfind('&').unwrap();
        assert!(body[last_amp..].contains(';'), "entity split: {}", &body[last_amp..]);
        assert!(text.ends_with("📚 Title: berserk\n📖 Volume/Chapter: 2/14"));

        let text = critical_message(&"&".repeat(5000), &ResumeState::default());
        assert!(text.chars().count() <= MAX_REPORT_CHARS);
        assert!(text.contains("&amp;</code>"));
        assert!(text.ends_with("📚 Title: none\n📖 Volume/Chapter: 1/1"));
    }

    #[test]
    fn test_status_message() {
        let mut state = state_on("berserk");
        state.processed_chapters.insert("berserk_1_1".to_string());
        let text = status_message(&state, Some("timeout"));
        assert!(text.contains("• Current title: berserk"));
        assert!(text.contains("• Chapters read: 1"));
        assert!(text.contains("• Last error: timeout"));

        let text = status_message(&ResumeState::default(), None);
        assert!(text.contains("• Last error: none"));
    }
}
