use super::parse::{self, CATALOG_CARD, CHAPTER_LINKS};
use super::scroll::scroll_positions;
use super::{Site, SiteError};
use crate::browser::{page, BrowserError, BrowserSession, DebugCapture};
use crate::interrupt::Interrupts;
use crate::models::{ChapterRef, Credentials, LoginOutcome, ReadOutcome};
use rand::Rng;
use std::path::Path;
use std::thread;
use std::time::Duration;

const EMAIL_INPUT: &str = "input[name='email']";
const PASSWORD_INPUT: &str = "input[name='password']";
const LOGIN_BUTTON: &str = "//button[contains(text(), 'Войти')]";
const INVALID_CREDENTIALS: &str = "Неверный email или пароль";
const LOGGED_IN_MARKERS: &[&str] = &[".user-avatar", ".user-menu"];
const LOGOUT_TEXT: &str = "Выйти";

const CONTENT_MARKERS: &str = ".reader-container, .reader, .manga-reader, .chapter-content, img";
const UNAVAILABLE_TEXTS: &[&str] = &["недоступна", "удалена"];
const FAVOURITE_BUTTON: &str =
    ".favourite-btn, .favorite-btn, [class*='favourite-btn'], [class*='favorite-btn']";

const MIN_SCROLL_STEPS: u32 = 10;
const MAX_SCROLL_STEPS: u32 = 20;
const INCIDENTAL_CLICK_CHANCE: f64 = 0.3;
const CHAPTER_LIST_SETTLE: Duration = Duration::from_secs(3);
const READ_SETTLE: Duration = Duration::from_secs(3);
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Page addresses on the site
#[derive(Debug, Clone)]
pub struct Urls {
    base: String,
}

impl Urls {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}/login", self.base)
    }

    pub fn catalog(&self, page: u32) -> String {
        format!("{}/manga?page={}", self.base, page)
    }

    pub fn title(&self, slug: &str) -> String {
        format!("{}/manga/{}", self.base, slug)
    }

    pub fn chapter(&self, slug: &str, chapter: ChapterRef) -> String {
        format!("{}/manga/{}/{}/{}", self.base, slug, chapter.volume, chapter.chapter)
    }
}

/// mangabuff.ru driven through the browser session
pub struct MangaBuff {
    session: BrowserSession,
    urls: Urls,
    credentials: Option<Credentials>,
}

impl MangaBuff {
    pub fn new(session: BrowserSession, base_url: &str) -> Self {
        Self {
            session,
            urls: Urls::new(base_url),
            credentials: None,
        }
    }

    fn element_timeout(&self) -> Duration {
        self.session.config().element_timeout()
    }

    fn missing_with_capture(&self, what: &str, prefix: &str) -> SiteError {
        let capture = match self.session.capture_debug(prefix) {
            Ok(capture) => Some(capture),
            Err(e) => {
                log::warn!("Could not capture debug info: {}", e);
                None
            }
        };
        SiteError::MissingElement {
            what: what.to_string(),
            capture,
        }
    }

    fn favourite_active(&self) -> Result<bool, BrowserError> {
        let classes = page::class_name(self.session.tab(), FAVOURITE_BUTTON)?;
        Ok(parse::is_active_favourite(&classes))
    }

    /// Make sure the title is in the account's favourites: click once,
    /// verify, click again if the toggle did not change.
    fn ensure_favourite(&self) -> Result<(), SiteError> {
        let tab = self.session.tab();
        page::wait_for(tab, FAVOURITE_BUTTON, self.element_timeout()).map_err(|e| match e {
            BrowserError::Timeout(_) => SiteError::missing("favourite button"),
            other => SiteError::Browser(other),
        })?;

        if self.favourite_active()? {
            return Ok(());
        }

        page::scroll_into_view(tab, FAVOURITE_BUTTON)?;
        thread::sleep(Duration::from_secs(1));
        page::click(tab, FAVOURITE_BUTTON)?;
        thread::sleep(Duration::from_secs(2));

        if !self.favourite_active()? {
            log::warn!("Favourite button did not change state after clicking, retrying");
            page::click(tab, FAVOURITE_BUTTON)?;
            thread::sleep(Duration::from_secs(2));
        }
        Ok(())
    }

    /// Scroll through the chapter in random steps with random pauses
    fn scroll_through(&self, interrupts: &Interrupts) -> Result<ReadOutcome, SiteError> {
        let tab = self.session.tab();
        let (total, viewport) = page::dimensions(tab)?;
        let mut rng = rand::thread_rng();
        let steps = rng.gen_range(MIN_SCROLL_STEPS..=MAX_SCROLL_STEPS);

        for position in scroll_positions(total, viewport, steps) {
            if let Err(interrupt) = interrupts.check() {
                return Ok(ReadOutcome::Interrupted(interrupt));
            }
            page::scroll_to(tab, position)?;

            let pause = Duration::from_secs_f64(rng.gen_range(0.5..2.0));
            if let Err(interrupt) = interrupts.sleep(pause, INTERRUPT_POLL) {
                return Ok(ReadOutcome::Interrupted(interrupt));
            }

            if rng.gen_bool(INCIDENTAL_CLICK_CHANCE) {
                if let Err(e) = page::click_body(tab) {
                    log::debug!("Incidental click failed: {}", e);
                }
            }
        }

        page::scroll_to_bottom(tab)?;
        // Already at the bottom; an interrupt here is picked up by the caller
        let _ = interrupts.sleep(READ_SETTLE, INTERRUPT_POLL);
        Ok(ReadOutcome::Completed)
    }
}

impl Site for MangaBuff {
    fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, SiteError> {
        if let Err(e) = self.session.clear_cookies() {
            log::warn!("Could not clear cookies before login: {}", e);
        }
        let url = self.urls.login();
        self.session.ensure_navigated(&url)?;

        let timeout = self.element_timeout();
        let tab = self.session.tab().clone();
        if page::wait_for(&tab, EMAIL_INPUT, timeout).is_err()
            || page::wait_for(&tab, PASSWORD_INPUT, timeout).is_err()
        {
            return Err(self.missing_with_capture("login form fields", "login_fields_missing_"));
        }

        page::fill(&tab, EMAIL_INPUT, &credentials.email)?;
        page::fill(&tab, PASSWORD_INPUT, &credentials.password)?;

        if let Err(e) = page::click_xpath(&tab, LOGIN_BUTTON, timeout) {
            if e.is_connection_loss() {
                return Err(e.into());
            }
            return Err(self.missing_with_capture("login button", "login_button_error_"));
        }

        match page::wait_for_xpath(&tab, &page::text_xpath(INVALID_CREDENTIALS), timeout) {
            Ok(()) => return Ok(LoginOutcome::Rejected),
            Err(e) if e.is_connection_loss() => return Err(e.into()),
            Err(_) => {}
        }

        if self.is_logged_in()? {
            self.credentials = Some(credentials.clone());
            Ok(LoginOutcome::LoggedIn)
        } else {
            if let Err(e) = self.session.capture_debug("login_ambiguous_") {
                log::warn!("Could not capture debug info: {}", e);
            }
            Ok(LoginOutcome::Undetermined)
        }
    }

    fn is_logged_in(&mut self) -> Result<bool, SiteError> {
        let tab = self.session.tab();
        if LOGGED_IN_MARKERS.iter().any(|marker| page::exists(tab, marker)) {
            return Ok(true);
        }
        if page::contains_text(tab, LOGOUT_TEXT) {
            return Ok(true);
        }
        Ok(!tab.get_url().contains("login"))
    }

    fn catalog_page(&mut self, page_number: u32) -> Result<Vec<String>, SiteError> {
        let url = self.urls.catalog(page_number);
        self.session.ensure_navigated(&url)?;

        let tab = self.session.tab();
        match page::wait_for(tab, CATALOG_CARD, self.element_timeout()) {
            Ok(()) => {}
            Err(e) if e.is_connection_loss() => return Err(e.into()),
            Err(_) => {
                log::info!("No title cards on catalog page {}", page_number);
                return Ok(Vec::new());
            }
        }

        let html = page::html(tab)?;
        Ok(parse::catalog_slugs(&html))
    }

    fn chapters(&mut self, slug: &str) -> Result<Vec<ChapterRef>, SiteError> {
        let url = self.urls.title(slug);
        self.session.ensure_navigated(&url)?;
        thread::sleep(CHAPTER_LIST_SETTLE);

        let tab = self.session.tab();
        let chapters = match page::wait_for(tab, CHAPTER_LINKS, self.element_timeout()) {
            Ok(()) => parse::chapter_refs(&page::html(tab)?, slug),
            Err(e) if e.is_connection_loss() => return Err(e.into()),
            Err(_) => Vec::new(),
        };

        if chapters.is_empty() {
            log::info!("No chapters found for {}, starting from vol. 1 ch. 1", slug);
            return Ok(vec![ChapterRef::FIRST]);
        }
        Ok(chapters)
    }

    fn read_chapter(
        &mut self,
        slug: &str,
        chapter: ChapterRef,
        interrupts: &Interrupts,
    ) -> Result<ReadOutcome, SiteError> {
        let url = self.urls.chapter(slug, chapter);
        self.session.ensure_navigated(&url)?;

        let tab = self.session.tab();
        match page::wait_for(tab, CONTENT_MARKERS, self.element_timeout()) {
            Ok(()) => {}
            Err(e) if e.is_connection_loss() => return Err(e.into()),
            Err(_) => {
                if UNAVAILABLE_TEXTS.iter().any(|text| page::contains_text(tab, text)) {
                    return Ok(ReadOutcome::Unavailable);
                }
                log::info!("Chapter content not fully loaded, continuing: {} {}", slug, chapter);
            }
        }

        self.ensure_favourite()?;
        self.scroll_through(interrupts)
    }

    fn capture_debug(&mut self, prefix: &str) -> Option<DebugCapture> {
        match self.session.capture_debug(prefix) {
            Ok(capture) => Some(capture),
            Err(e) => {
                log::warn!("Could not capture debug info: {}", e);
                None
            }
        }
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), SiteError> {
        Ok(self.session.screenshot(path)?)
    }

    /// Relaunch the browser and log back in with the last accepted credentials
    fn recover(&mut self) -> Result<(), SiteError> {
        self.session.reinitialize()?;

        if let Some(credentials) = self.credentials.clone() {
            match self.login(&credentials)? {
                LoginOutcome::LoggedIn => log::info!("Logged back in after relaunch"),
                outcome => log::warn!("Login after relaunch did not succeed: {:?}", outcome),
            }
        }
        Ok(())
    }
}
