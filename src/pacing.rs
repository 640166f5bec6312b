use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Reading speed in chapters per hour, always within `[MIN, MAX]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingRate(u16);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("'{0}' is not a whole number")]
    NotANumber(String),

    #[error("reading speed must be between {min} and {max} chapters per hour, got {got}")]
    OutOfRange { got: i64, min: u16, max: u16 },
}

impl ReadingRate {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 666;

    pub fn new(per_hour: i64) -> Result<Self, RateError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&per_hour) {
            Ok(Self(per_hour as u16))
        } else {
            Err(RateError::OutOfRange {
                got: per_hour,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub fn per_hour(&self) -> u16 {
        self.0
    }

    /// Pause between two chapters: `3600 / rate` seconds
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(3600.0 / f64::from(self.0))
    }
}

impl Default for ReadingRate {
    fn default() -> Self {
        Self(60)
    }
}

impl fmt::Display for ReadingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} chapters/hour", self.0)
    }
}

impl FromStr for ReadingRate {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| RateError::NotANumber(trimmed.to_string()))?;
        Self::new(value)
    }
}

/// Position in the catalog and the run of consecutive empty pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCursor {
    pub page: u32,
    pub empty_streak: u32,
    pub max_pages: u32,
    pub empty_limit: u32,
}

impl CatalogCursor {
    pub fn new(page: u32, max_pages: u32, empty_limit: u32) -> Self {
        Self {
            page: page.max(1),
            empty_streak: 0,
            max_pages: max_pages.max(1),
            empty_limit: empty_limit.max(1),
        }
    }

    /// An empty page: rewind to page 1 once the streak hits the limit,
    /// otherwise move on, wrapping past the last page.
    pub fn record_empty(&mut self) {
        self.empty_streak += 1;
        if self.empty_streak >= self.empty_limit {
            log::warn!(
                "{} empty catalog pages in a row, returning to page 1",
                self.empty_streak
            );
            self.page = 1;
            self.empty_streak = 0;
        } else {
            self.page += 1;
            if self.page > self.max_pages {
                self.page = 1;
            }
        }
    }

    pub fn record_found(&mut self) {
        self.empty_streak = 0;
    }
}
