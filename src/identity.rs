use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Who this installation is: a persistent id plus the OS user and host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub installation_id: Uuid,
    pub username: String,
    pub hostname: String,
}

#[derive(Serialize, Deserialize)]
struct IdentityFile {
    user_id: Uuid,
}

impl Identity {
    pub const FILE: &'static str = "user_config.json";

    pub fn with_parts(installation_id: Uuid, username: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            installation_id,
            username: username.into(),
            hostname: hostname.into(),
        }
    }

    /// Fresh random id for the current user and host
    pub fn generate() -> Self {
        Self::with_parts(Uuid::new_v4(), current_username(), current_hostname())
    }

    /// Read the id from `path`; `None` when missing, unparsable or keyless
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        let file: IdentityFile = serde_json::from_str(&content).ok()?;
        Some(Self::with_parts(file.user_id, current_username(), current_hostname()))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let file = IdentityFile {
            user_id: self.installation_id,
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(path, json)
    }

    /// Load the stored identity or create and persist a new one.
    /// Failing to persist is logged only.
    pub fn load_or_create(path: &Path) -> Self {
        if let Some(identity) = Self::load(path) {
            return identity;
        }
        let identity = Self::generate();
        if let Err(e) = identity.save(path) {
            log::warn!("Could not save {}: {}", path.display(), e);
        }
        identity
    }

    /// First 8 characters of the id
    pub fn short_id(&self) -> String {
        self.installation_id.to_string().chars().take(8).collect()
    }

    /// `user@host`
    pub fn display_name(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }
}

fn current_username() -> String {
    first_env(&["USER", "USERNAME"]).unwrap_or_else(|| "unknown".to_string())
}

fn current_hostname() -> String {
    first_env(&["HOSTNAME", "COMPUTERNAME"])
        .or_else(|| {
            fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
