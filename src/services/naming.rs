use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::storage::{RemoteStore, StoreError, remote_join};

/// Attempts at finding a free name before giving up
pub const MAX_NAME_CANDIDATES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPolicy {
    /// `category.ext`, timestamped only when that name is taken
    CheckThenTimestamp,
    /// Always `category_yyyymmdd_hhmmss.ext`, no existence check
    AlwaysTimestamp,
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "check" | "check-then-timestamp" => Ok(Self::CheckThenTimestamp),
            "timestamp" | "always-timestamp" => Ok(Self::AlwaysTimestamp),
            other => Err(format!("unknown naming policy: {}", other)),
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CheckThenTimestamp => write!(f, "check"),
            Self::AlwaysTimestamp => write!(f, "timestamp"),
        }
    }
}

/// `yyyymmdd_hhmmss`
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Timestamped name; `attempt` > 0 adds a counter starting at 2.
pub fn timestamped_name(category: &str, ext: &str, at: NaiveDateTime, attempt: u32) -> String {
    let ts = format_timestamp(at);
    if attempt == 0 {
        format!("{}_{}{}", category, ts, ext)
    } else {
        format!("{}_{}_{}{}", category, ts, attempt + 1, ext)
    }
}

/// Picks remote file names that do not overwrite existing objects
#[derive(Debug, Clone, Copy)]
pub struct ConflictSafeNamer {
    policy: NamingPolicy,
}

impl ConflictSafeNamer {
    pub fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// First name to try inside `folder`.
    pub async fn initial_name(
        &self,
        store: &dyn RemoteStore,
        folder: &str,
        category: &str,
        ext: &str,
        at: NaiveDateTime,
    ) -> Result<String, StoreError> {
        match self.policy {
            NamingPolicy::AlwaysTimestamp => Ok(timestamped_name(category, ext, at, 0)),
            NamingPolicy::CheckThenTimestamp => {
                let plain = format!("{}{}", category, ext);
                if store.exists(&remote_join(folder, &[&plain])).await? {
                    Ok(timestamped_name(category, ext, at, 0))
                } else {
                    Ok(plain)
                }
            }
        }
    }

    /// Names to try in order: `initial`, then timestamped fallbacks with a
    /// growing counter. Each is used only after the previous one was rejected
    /// because it already exists.
    pub fn candidates(
        &self,
        initial: String,
        category: &str,
        ext: &str,
        at: NaiveDateTime,
    ) -> Vec<String> {
        let mut names = vec![initial];
        for attempt in 0..MAX_NAME_CANDIDATES {
            let name = timestamped_name(category, ext, at, attempt);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.truncate(MAX_NAME_CANDIDATES as usize);
        names
    }
}
