#![allow(dead_code)]

use manga_reader_bot::browser::{BrowserError, DebugCapture};
use manga_reader_bot::driver::{Driver, DriverOptions, ItemPicker};
use manga_reader_bot::interrupt::{Interrupt, Interrupts};
use manga_reader_bot::models::{ChapterRef, Credentials, LoginOutcome, ReadOutcome};
use manga_reader_bot::notifier::{Notify, NotifyError};
use manga_reader_bot::site::{Site, SiteError};
use manga_reader_bot::state::{ResumeState, StateStore};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Raise an interrupt once the site has served `after_reads` chapter reads
pub struct Trigger {
    pub after_reads: usize,
    pub interrupts: Interrupts,
    pub kind: Interrupt,
}

/// In-memory site with scripted catalog, chapter lists and failures
#[derive(Default)]
pub struct FakeSite {
    pub catalog: HashMap<u32, Vec<String>>,
    /// Successive answers per title; the last one repeats
    pub chapter_lists: HashMap<String, VecDeque<Vec<ChapterRef>>>,
    pub failing: HashSet<(String, ChapterRef)>,
    pub unavailable: HashSet<(String, ChapterRef)>,
    pub disconnecting: HashSet<(String, ChapterRef)>,
    /// Catalog visits that fail as if the guarded navigation gave up
    pub catalog_failures: usize,
    pub catalog_stop: Option<(usize, Interrupts)>,
    pub login_outcomes: VecDeque<LoginOutcome>,
    pub trigger: Option<Trigger>,

    pub reads: Vec<(String, ChapterRef)>,
    pub catalog_visits: Vec<u32>,
    pub chapter_fetches: usize,
    pub login_attempts: usize,
    pub screenshots: Vec<PathBuf>,
    pub recoveries: usize,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog_page(mut self, page: u32, items: &[&str]) -> Self {
        self.catalog
            .insert(page, items.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_chapters(mut self, slug: &str, lists: Vec<Vec<(u32, u32)>>) -> Self {
        let lists = lists
            .into_iter()
            .map(|list| list.into_iter().map(ChapterRef::from).collect())
            .collect();
        self.chapter_lists.insert(slug.to_string(), lists);
        self
    }

    pub fn failing_on(mut self, slug: &str, chapter: (u32, u32)) -> Self {
        self.failing.insert((slug.to_string(), chapter.into()));
        self
    }

    pub fn unavailable_on(mut self, slug: &str, chapter: (u32, u32)) -> Self {
        self.unavailable.insert((slug.to_string(), chapter.into()));
        self
    }

    pub fn disconnecting_on(mut self, slug: &str, chapter: (u32, u32)) -> Self {
        self.disconnecting.insert((slug.to_string(), chapter.into()));
        self
    }

    pub fn with_catalog_failures(mut self, count: usize) -> Self {
        self.catalog_failures = count;
        self
    }

    /// Request stop during the `visit`-th catalog visit
    pub fn stopping_on_catalog_visit(mut self, visit: usize, interrupts: &Interrupts) -> Self {
        self.catalog_stop = Some((visit, interrupts.clone()));
        self
    }

    pub fn with_trigger(mut self, after_reads: usize, interrupts: &Interrupts, kind: Interrupt) -> Self {
        self.trigger = Some(Trigger {
            after_reads,
            interrupts: interrupts.clone(),
            kind,
        });
        self
    }

    pub fn with_logins(mut self, outcomes: &[LoginOutcome]) -> Self {
        self.login_outcomes = outcomes.iter().copied().collect();
        self
    }

    fn fire_trigger(&self) {
        if let Some(trigger) = &self.trigger {
            if self.reads.len() == trigger.after_reads {
                match trigger.kind {
                    Interrupt::Stop => trigger.interrupts.request_stop(),
                    Interrupt::Switch => trigger.interrupts.request_switch(),
                }
            }
        }
    }
}

impl Site for FakeSite {
    fn login(&mut self, _credentials: &Credentials) -> Result<LoginOutcome, SiteError> {
        self.login_attempts += 1;
        Ok(self
            .login_outcomes
            .pop_front()
            .unwrap_or(LoginOutcome::Undetermined))
    }

    fn is_logged_in(&mut self) -> Result<bool, SiteError> {
        Ok(true)
    }

    fn catalog_page(&mut self, page: u32) -> Result<Vec<String>, SiteError> {
        self.catalog_visits.push(page);
        if let Some((visit, interrupts)) = &self.catalog_stop {
            if self.catalog_visits.len() == *visit {
                interrupts.request_stop();
            }
        }

        if self.catalog_failures > 0 {
            self.catalog_failures -= 1;
            return Err(SiteError::Browser(BrowserError::RetriesExhausted {
                label: format!("navigate to catalog page {}", page),
                attempts: 3,
                last: "timed out".to_string(),
                capture: self.capture_debug("retries_exhausted_"),
            }));
        }
        Ok(self.catalog.get(&page).cloned().unwrap_or_default())
    }

    fn chapters(&mut self, slug: &str) -> Result<Vec<ChapterRef>, SiteError> {
        self.chapter_fetches += 1;
        let lists = self
            .chapter_lists
            .get_mut(slug)
            .ok_or_else(|| SiteError::Browser(BrowserError::NavigationError(slug.to_string())))?;
        if lists.len() > 1 {
            Ok(lists.pop_front().unwrap_or_default())
        } else {
            Ok(lists.front().cloned().unwrap_or_default())
        }
    }

    fn read_chapter(
        &mut self,
        slug: &str,
        chapter: ChapterRef,
        _interrupts: &Interrupts,
    ) -> Result<ReadOutcome, SiteError> {
        let key = (slug.to_string(), chapter);
        self.reads.push(key.clone());
        self.fire_trigger();

        if self.disconnecting.contains(&key) {
            return Err(SiteError::Browser(BrowserError::ConnectionLost(
                "websocket closed".to_string(),
            )));
        }
        if self.failing.contains(&key) {
            return Err(SiteError::missing("favourite button"));
        }
        if self.unavailable.contains(&key) {
            return Ok(ReadOutcome::Unavailable);
        }
        Ok(ReadOutcome::Completed)
    }

    fn capture_debug(&mut self, prefix: &str) -> Option<DebugCapture> {
        Some(DebugCapture {
            label: prefix.to_string(),
            screenshot: PathBuf::from(format!("debug/{}debug.png", prefix)),
            page_source: PathBuf::from(format!("debug/{}page_source.html", prefix)),
            cookies: PathBuf::from(format!("debug/{}cookies.json", prefix)),
        })
    }

    fn screenshot(&mut self, path: &Path) -> Result<(), SiteError> {
        self.screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn recover(&mut self) -> Result<(), SiteError> {
        self.recoveries += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Photo(PathBuf, String),
    Document(PathBuf, String),
}

/// Notifier that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn has_text_containing(&self, needle: &str) -> bool {
        self.texts().iter().any(|text| text.contains(needle))
    }
}

impl Notify for RecordingNotifier {
    fn send_text(&self, text: &str, _silent: bool) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    fn send_photo(&self, path: &Path, caption: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Photo(path.to_path_buf(), caption.to_string()));
        Ok(())
    }

    fn send_document(&self, path: &Path, caption: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Document(path.to_path_buf(), caption.to_string()));
        Ok(())
    }
}

/// Always takes the first title on the page
pub struct FirstPicker;

impl ItemPicker for FirstPicker {
    fn pick<'a>(&mut self, items: &'a [String]) -> Option<&'a String> {
        items.first()
    }
}

/// Options with millisecond waits so loops run instantly
pub fn fast_options(dir: &Path) -> DriverOptions {
    DriverOptions {
        pacing: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        error_cooldown: Duration::from_millis(5),
        log_file: dir.join("missing_log.txt"),
        status_screenshot: dir.join("debug").join("current_status.png"),
        ..DriverOptions::default()
    }
}

pub fn driver_with(
    site: FakeSite,
    notifier: &Arc<RecordingNotifier>,
    dir: &Path,
    state: ResumeState,
    interrupts: &Interrupts,
    options: DriverOptions,
) -> Driver<FakeSite, FirstPicker> {
    Driver::with_picker(
        site,
        notifier.clone(),
        StateStore::new(dir.join("manga_state_test.json")),
        state,
        interrupts.clone(),
        options,
        FirstPicker,
    )
}
