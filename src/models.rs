use crate::interrupt::Interrupt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chapter position on the site: `/manga/{slug}/{volume}/{chapter}`.
/// Ordered by volume, then chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChapterRef {
    pub volume: u32,
    pub chapter: u32,
}

impl ChapterRef {
    pub const FIRST: ChapterRef = ChapterRef { volume: 1, chapter: 1 };

    pub fn new(volume: u32, chapter: u32) -> Self {
        Self { volume, chapter }
    }
}

impl fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vol. {} ch. {}", self.volume, self.chapter)
    }
}

impl From<(u32, u32)> for ChapterRef {
    fn from((volume, chapter): (u32, u32)) -> Self {
        Self { volume, chapter }
    }
}

/// Key recorded in the processed set: `{slug}_{volume}_{chapter}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterKey(String);

impl ChapterKey {
    pub fn new(slug: &str, chapter: ChapterRef) -> Self {
        Self(format!("{}_{}_{}", slug, chapter.volume, chapter.chapter))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Site account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// Result of one login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    /// The site showed its invalid-credentials message
    Rejected,
    /// Neither the error message nor any logged-in indicator appeared
    Undetermined,
}

/// Result of reading one chapter page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Completed,
    /// The site says the chapter was removed or is unavailable
    Unavailable,
    Interrupted(Interrupt),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_key_format() {
        let key = ChapterKey::new("one-piece", ChapterRef::new(3, 27));
        assert_eq!(key.as_str(), "one-piece_3_27");
    }

    #[test]
    fn test_chapter_order() {
        let mut chapters = vec![
            ChapterRef::new(2, 1),
            ChapterRef::new(1, 10),
            ChapterRef::new(1, 2),
        ];
        chapters.sort();
        assert_eq!(
            chapters,
            vec![ChapterRef::new(1, 2), ChapterRef::new(1, 10), ChapterRef::new(2, 1)]
        );
    }

    #[test]
    fn test_credentials_debug_masks_password() {
        let creds = Credentials::new("reader@example.com", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("reader@example.com"));
        assert!(!printed.contains("hunter2"));
    }
}
