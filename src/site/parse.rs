//! Extraction from page markup. Pure functions over the HTML the browser
//! hands back, so they can be tested against fixtures.

use crate::helpers::last_segment;
use crate::models::ChapterRef;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;

pub const CATALOG_CARD: &str = "a.cards__item";
pub const CHAPTER_LINKS: &str = "a.chapter-item, a.chapter-link, [href*='/manga/']";

/// Title slugs linked from a catalog page, in page order, without duplicates
pub fn catalog_slugs(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(CATALOG_CARD) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut seen = BTreeSet::new();
    let mut slugs = Vec::new();
    for card in document.select(&selector) {
        let Some(href) = card.value().attr("href") else {
            continue;
        };
        if !href.contains("/manga/") {
            continue;
        }
        match last_segment(href) {
            Some(slug) if slug != "manga" => {
                if seen.insert(slug.to_string()) {
                    slugs.push(slug.to_string());
                }
            }
            _ => log::debug!("Skipping catalog link without a slug: {}", href),
        }
    }
    slugs
}

/// Chapters of `slug` linked from its title page, deduplicated and sorted by
/// volume then chapter. Links to other titles are ignored.
pub fn chapter_refs(html: &str, slug: &str) -> Vec<ChapterRef> {
    let Ok(selector) = Selector::parse(CHAPTER_LINKS) else {
        return Vec::new();
    };
    let pattern = format!(r"/manga/{}/(\d+)/(\d+)/?(?:[?#].*)?$", regex::escape(slug));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let chapters: BTreeSet<ChapterRef> = document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| re.captures(href))
        .filter_map(|caps| {
            let volume = caps[1].parse().ok()?;
            let chapter = caps[2].parse().ok()?;
            Some(ChapterRef::new(volume, chapter))
        })
        .collect();

    chapters.into_iter().collect()
}

/// Whether the favourite toggle's class list marks it active
pub fn is_active_favourite(class_list: &str) -> bool {
    class_list
        .split_whitespace()
        .any(|class| class == "active" || class.ends_with("--active"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        <div class="cards">
            <a class="cards__item" href="https://mangabuff.ru/manga/vanpanchmen">One Punch</a>
            <a class="cards__item" href="/manga/berserk/">Berserk</a>
            <a class="cards__item" href="/manga/vanpanchmen">Duplicate</a>
            <a class="cards__item" href="/manga">Catalog root</a>
            <a class="cards__item" href="/news/42">News</a>
            <a class="other" href="/manga/not-a-card">Sidebar</a>
        </div>
    "#;

    const TITLE_PAGE: &str = r#"
        <div class="chapters">
            <a class="chapter-item" href="https://mangabuff.ru/manga/berserk/2/10">2-10</a>
            <a class="chapter-item" href="/manga/berserk/1/2">1-2</a>
            <a class="chapter-link" href="/manga/berserk/1/10">1-10</a>
            <a href="/manga/berserk/1/2">again</a>
            <a href="/manga/berserk/1/1?from=list">1-1</a>
            <a href="/manga/berserk-remake/1/1">other title</a>
            <a href="/manga/berserk">title</a>
            <a href="/manga/berserk/1/extra">broken</a>
        </div>
    "#;

    #[test]
    fn test_catalog_slugs() {
        assert_eq!(catalog_slugs(CATALOG), vec!["vanpanchmen", "berserk"]);
        assert!(catalog_slugs("<html><body>empty</body></html>").is_empty());
    }

    #[test]
    fn test_chapter_refs_sorted_and_filtered() {
        let chapters = chapter_refs(TITLE_PAGE, "berserk");
        assert_eq!(
            chapters,
            vec![
                ChapterRef::new(1, 1),
                ChapterRef::new(1, 2),
                ChapterRef::new(1, 10),
                ChapterRef::new(2, 10),
            ]
        );
    }

    #[test]
    fn test_chapter_refs_escape_slug() {
        let html = r#"<a href="/manga/a.b/1/1">x</a><a href="/manga/axb/1/2">y</a>"#;
        assert_eq!(chapter_refs(html, "a.b"), vec![ChapterRef::new(1, 1)]);
    }

    #[test]
    fn test_favourite_state() {
        assert!(is_active_favourite("favourite-btn active"));
        assert!(is_active_favourite("btn favourite-btn--active"));
        assert!(!is_active_favourite("favourite-btn"));
        assert!(!is_active_favourite("favourite-btn inactive"));
    }
}
