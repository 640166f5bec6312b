//! The reading loop: catalog page -> title -> chapters -> pacing -> catalog.
//!
//! All session context (site, notifier, state, interrupts, counters) lives on
//! [`Driver`]. Stop and switch requests are only looked at between scroll
//! steps, between chapters, during the pacing wait and at the top of every
//! loop iteration.

use crate::browser::{BrowserError, DebugCapture};
use crate::config::Tuning;
use crate::error::BotError;
use crate::helpers::truncate;
use crate::interrupt::{Interrupt, Interrupts};
use crate::login;
use crate::models::{ChapterKey, ChapterRef, Credentials, ReadOutcome};
use crate::notifier::{notify_quietly, Notify};
use crate::pacing::{CatalogCursor, ReadingRate};
use crate::report;
use crate::site::{Site, SiteError};
use crate::state::{ResumeState, StateStore};
use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const MAX_LAST_ERROR_CHARS: usize = 500;

/// Chooses which title to read from a catalog page
pub trait ItemPicker {
    fn pick<'a>(&mut self, items: &'a [String]) -> Option<&'a String>;
}

/// Uniform random choice, no memory of earlier picks
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl ItemPicker for RandomPicker {
    fn pick<'a>(&mut self, items: &'a [String]) -> Option<&'a String> {
        items.choose(&mut rand::thread_rng())
    }
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub rate: ReadingRate,
    /// Wait between two chapters of a title
    pub pacing: Duration,
    /// Slice size for interruptible waits
    pub poll_interval: Duration,
    /// Pause after a failed loop iteration before recovering
    pub error_cooldown: Duration,
    pub max_pages: u32,
    pub empty_page_limit: u32,
    pub status_every: usize,
    pub log_file: PathBuf,
    pub status_screenshot: PathBuf,
}

impl Default for DriverOptions {
    fn default() -> Self {
        let rate = ReadingRate::default();
        Self {
            rate,
            pacing: rate.delay(),
            poll_interval: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(10),
            max_pages: 100,
            empty_page_limit: 3,
            status_every: 10,
            log_file: PathBuf::from(crate::logging::LOG_FILE),
            status_screenshot: PathBuf::from("debug/current_status.png"),
        }
    }
}

impl DriverOptions {
    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self {
            max_pages: tuning.catalog.max_pages,
            empty_page_limit: tuning.catalog.empty_page_limit,
            status_every: tuning.catalog.status_report_every,
            ..Self::default()
        }
    }
}

/// What happened to one chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterStep {
    /// Already in the processed set; the site was not touched
    Skipped,
    /// Read and recorded; `next` is the following chapter in list order
    Completed { next: Option<ChapterRef> },
    /// Removed or unavailable on the site, recorded so it is not retried
    Unavailable,
    /// Not recorded; the loop moves on to the next chapter
    Failed,
}

/// How processing of one title ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEnd {
    Finished { read: usize },
    Switched,
    Abandoned,
}

pub struct Driver<S: Site, P: ItemPicker = RandomPicker> {
    site: S,
    notifier: Arc<dyn Notify>,
    store: StateStore,
    state: ResumeState,
    interrupts: Interrupts,
    options: DriverOptions,
    cursor: CatalogCursor,
    picker: P,
    last_error: Option<String>,
}

impl<S: Site> Driver<S, RandomPicker> {
    pub fn new(
        site: S,
        notifier: Arc<dyn Notify>,
        store: StateStore,
        state: ResumeState,
        interrupts: Interrupts,
        options: DriverOptions,
    ) -> Self {
        Self::with_picker(site, notifier, store, state, interrupts, options, RandomPicker)
    }
}

impl<S: Site, P: ItemPicker> Driver<S, P> {
    pub fn with_picker(
        site: S,
        notifier: Arc<dyn Notify>,
        store: StateStore,
        state: ResumeState,
        interrupts: Interrupts,
        options: DriverOptions,
        picker: P,
    ) -> Self {
        let cursor = CatalogCursor::new(state.current_page, options.max_pages, options.empty_page_limit);
        Self {
            site,
            notifier,
            store,
            state,
            interrupts,
            options,
            cursor,
            picker,
            last_error: None,
        }
    }

    pub fn state(&self) -> &ResumeState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn site_mut(&mut self) -> &mut S {
        &mut self.site
    }

    pub fn into_parts(self) -> (S, ResumeState) {
        (self.site, self.state)
    }

    pub fn save_state(&self) -> bool {
        self.store.save(&self.state)
    }

    pub fn set_reading_rate(&mut self, rate: ReadingRate) {
        self.options.rate = rate;
        self.options.pacing = rate.delay();
        log::info!("Reading speed set to {}", rate);
        notify_quietly(
            self.notifier.as_ref(),
            &format!("⚡ Reading speed set: {} chapters/hour", rate.per_hour()),
        );
    }

    pub fn login(&mut self, credentials: &Credentials, max_attempts: u32) -> Result<(), BotError> {
        login::run(
            &mut self.site,
            self.notifier.as_ref(),
            credentials,
            max_attempts,
            &self.interrupts,
        )
    }

    /// Loop until stop is requested. Only an unrecoverable session failure
    /// returns an error.
    pub fn run(&mut self) -> Result<(), BotError> {
        loop {
            match self.step() {
                Ok(()) => {}
                Err(BotError::Interrupted(Interrupt::Stop)) => break,
                Err(BotError::Interrupted(Interrupt::Switch)) => {
                    self.interrupts.take_switch();
                    log::info!("Switch requested, returning to the catalog");
                    self.clear_item();
                }
                Err(e) => {
                    if self.recover_from(e)?.is_err() {
                        break;
                    }
                }
            }
        }
        log::info!("Reading loop stopped");
        self.save_state();
        Ok(())
    }

    /// One loop iteration: finish the current title, or pick a new one
    pub fn step(&mut self) -> Result<(), BotError> {
        self.interrupts.check()?;

        if let Some(slug) = self.state.current_manga.clone() {
            let end = self.process_item(&slug)?;
            log::debug!("{} ended: {:?}", slug, end);
            self.clear_item();
            return Ok(());
        }

        self.select_item()
    }

    fn clear_item(&mut self) {
        self.state.current_manga = None;
        self.save_state();
    }

    /// Report a failed iteration, cool down and get the site usable again.
    /// `Ok(Err(Stop))` when stop arrived during the cool-down.
    fn recover_from(&mut self, error: BotError) -> Result<Result<(), Interrupt>, BotError> {
        self.report_error(&format!("Main loop error: {}", truncate(&error.to_string(), 100)));
        match error_capture(&error) {
            Some(capture) => self.upload_capture(&capture),
            None => self.capture_debug("main_loop_error_"),
        }

        if let Err(interrupt) = self.interrupts.sleep(self.options.error_cooldown, self.options.poll_interval) {
            if interrupt == Interrupt::Stop {
                return Ok(Err(interrupt));
            }
        }

        self.site.recover().map_err(|e| {
            log::error!("Could not recover the browser session: {}", e);
            BotError::Site(e)
        })?;
        Ok(Ok(()))
    }

    /// Visit the current catalog page and pin a random title from it
    pub fn select_item(&mut self) -> Result<(), BotError> {
        let page = self.cursor.page;
        let items = match self.site.catalog_page(page) {
            Ok(items) => items,
            Err(e) if is_fatal(&e) => return Err(e.into()),
            Err(e) => {
                self.report_error(&format!("Failed to load catalog page {}: {}", page, e));
                Vec::new()
            }
        };

        if items.is_empty() {
            log::info!(
                "No titles on catalog page {} (empty {}/{})",
                page,
                self.cursor.empty_streak + 1,
                self.cursor.empty_limit
            );
            self.cursor.record_empty();
            self.state.current_page = self.cursor.page;
            self.save_state();
            return Ok(());
        }
        self.cursor.record_found();

        let Some(slug) = self.picker.pick(&items).cloned() else {
            return Ok(());
        };
        log::info!("Picked {} from catalog page {}", slug, page);
        self.state.select(&slug);
        self.save_state();

        if self.options.status_every > 0 && self.state.processed_count() % self.options.status_every == 0 {
            self.send_status_report();
        }
        Ok(())
    }

    /// Read a title through. A switch request ends it early and is cleared
    /// here; a stop request propagates.
    pub fn process_item(&mut self, slug: &str) -> Result<ItemEnd, BotError> {
        match self.read_item(slug) {
            Err(BotError::Interrupted(Interrupt::Switch)) => {
                self.interrupts.take_switch();
                log::info!("Abandoning {} on operator request", slug);
                Ok(ItemEnd::Switched)
            }
            other => other,
        }
    }

    fn read_item(&mut self, slug: &str) -> Result<ItemEnd, BotError> {
        log::info!("Starting {}", slug);
        notify_quietly(self.notifier.as_ref(), &report::item_started(slug, self.options.rate));

        let mut chapters = match self.site.chapters(slug) {
            Ok(chapters) if !chapters.is_empty() => chapters,
            Ok(_) => {
                self.report_error(&format!("No chapters listed for {}", slug));
                return Ok(ItemEnd::Abandoned);
            }
            Err(e) => {
                self.report_error(&format!("Could not load the chapter list of {}: {}", slug, e));
                return Ok(ItemEnd::Abandoned);
            }
        };

        if !chapters.contains(&self.state.position()) {
            self.state.set_position(chapters[0]);
            self.save_state();
        }

        let mut read = 0;
        loop {
            for (index, chapter) in chapters.iter().copied().enumerate() {
                self.interrupts.check()?;
                if self.state.is_processed(&ChapterKey::new(slug, chapter)) {
                    continue;
                }

                self.state.set_position(chapter);
                self.save_state();

                if let ChapterStep::Completed { next } = self.process_chapter(slug, chapter, &chapters)? {
                    read += 1;
                    if let Some(next) = next {
                        log::debug!("Next up: {}", next);
                    }
                }

                if index + 1 < chapters.len() {
                    self.interrupts.sleep(self.options.pacing, self.options.poll_interval)?;
                }
            }

            // Only the length is compared; reordered or replaced chapters go unnoticed
            match self.site.chapters(slug) {
                Ok(updated) if updated.len() > chapters.len() => {
                    log::info!("New chapters for {} ({} -> {})", slug, chapters.len(), updated.len());
                    notify_quietly(
                        self.notifier.as_ref(),
                        &report::new_chapters(slug, chapters.len(), updated.len()),
                    );
                    chapters = updated;
                }
                Ok(_) => break,
                Err(e) => {
                    self.report_error(&format!("Failed to check {} for new chapters: {}", slug, e));
                    break;
                }
            }
        }

        log::info!("Finished {} ({} chapters read)", slug, read);
        notify_quietly(self.notifier.as_ref(), &report::item_finished(slug, read));
        Ok(ItemEnd::Finished { read })
    }

    /// Read one chapter. A processed chapter is a no-op; failures are
    /// reported and leave the chapter unrecorded. Only interrupts escape.
    pub fn process_chapter(
        &mut self,
        slug: &str,
        chapter: ChapterRef,
        chapters: &[ChapterRef],
    ) -> Result<ChapterStep, Interrupt> {
        let key = ChapterKey::new(slug, chapter);
        if self.state.is_processed(&key) {
            log::debug!("{} {} already read", slug, chapter);
            return Ok(ChapterStep::Skipped);
        }

        match self.site.read_chapter(slug, chapter, &self.interrupts) {
            Ok(ReadOutcome::Completed) => {
                self.state.mark_processed(key);
                self.save_state();
                log::info!("Read {} {}", slug, chapter);
                Ok(ChapterStep::Completed {
                    next: next_chapter(chapters, chapter),
                })
            }
            Ok(ReadOutcome::Unavailable) => {
                self.state.mark_processed(key);
                self.save_state();
                self.report_error(&report::chapter_unavailable(slug, chapter));
                Ok(ChapterStep::Unavailable)
            }
            Ok(ReadOutcome::Interrupted(interrupt)) => Err(interrupt),
            Err(e) => {
                self.report_error(&format!("Failed to read {} {}: {}", slug, chapter, truncate(&e.to_string(), 100)));
                if let Some(capture) = e.capture() {
                    self.upload_capture(capture);
                }
                if e.is_connection_loss() {
                    if let Err(e) = self.site.recover() {
                        log::error!("Could not recover the browser session: {}", e);
                    }
                }
                Ok(ChapterStep::Failed)
            }
        }
    }

    /// Log an error, remember it and mirror it to the operator with context
    pub fn report_error(&mut self, message: &str) {
        log::error!("{}", message);
        self.last_error = Some(truncate(message, MAX_LAST_ERROR_CHARS));
        if let Err(e) = self
            .notifier
            .send_text(&report::error_message(message, &self.state), false)
        {
            log::warn!("Could not send error to Telegram: {}", e);
        }
    }

    /// Status text, a screenshot of the browser and the log file
    pub fn send_status_report(&mut self) {
        let text = report::status_message(&self.state, self.last_error.as_deref());
        if let Err(e) = self.notifier.send_text(&text, false) {
            log::warn!("Could not send status report: {}", e);
            return;
        }

        let screenshot = self.options.status_screenshot.clone();
        if let Some(parent) = screenshot.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Could not create {}: {}", parent.display(), e);
            }
        }
        match self.site.screenshot(&screenshot) {
            Ok(()) => {
                if let Err(e) = self.notifier.send_photo(&screenshot, "Current browser state") {
                    log::warn!("Could not send status screenshot: {}", e);
                }
            }
            Err(e) => log::warn!("Could not take status screenshot: {}", e),
        }

        if self.options.log_file.exists() {
            if let Err(e) = self.notifier.send_document(&self.options.log_file, "Full bot log") {
                log::warn!("Could not send log file: {}", e);
            }
        }
    }

    /// Capture the page for post-mortem and send it to the operator
    pub fn capture_debug(&mut self, prefix: &str) {
        if let Some(capture) = self.site.capture_debug(prefix) {
            self.upload_capture(&capture);
        }
    }

    fn upload_capture(&self, capture: &DebugCapture) {
        let caption = format!("🐛 Debug: {}", capture.label);
        if let Err(e) = self.notifier.send_photo(&capture.screenshot, &caption) {
            log::warn!("Could not upload debug screenshot: {}", e);
        }
        if let Err(e) = self.notifier.send_document(&capture.page_source, &caption) {
            log::warn!("Could not upload page source: {}", e);
        }
    }
}

/// Chapter after `current` in list order
pub fn next_chapter(chapters: &[ChapterRef], current: ChapterRef) -> Option<ChapterRef> {
    let index = chapters.iter().position(|c| *c == current)?;
    chapters.get(index + 1).copied()
}

/// Errors the catalog step hands to the loop's recovery instead of treating
/// the page as empty
fn is_fatal(error: &SiteError) -> bool {
    error.is_connection_loss()
        || matches!(error, SiteError::Browser(BrowserError::RetriesExhausted { .. }))
}

fn error_capture(error: &BotError) -> Option<DebugCapture> {
    match error {
        BotError::Site(e) => e.capture().cloned(),
        BotError::Browser(e) => e.capture().cloned(),
        _ => None,
    }
}
