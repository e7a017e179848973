//! Raw-payload cache consulted before every upstream cost request.
//!
//! Payloads are stored verbatim (JSON text) under an escaped request key, so
//! a cache hit reproduces exactly the table a live request would have built.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use report_core::Result;
use tracing::{debug, info};

/// Keyed string store for raw upstream payloads.
pub trait RawDataCache {
    /// Whether lookups and saves are performed at all.
    fn enabled(&self) -> bool;

    /// Cached payload for `key`, or `None` on a miss (or when disabled).
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`. A disabled cache ignores the call.
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Escape a key into a file-system friendly name.
///
/// Every byte outside `[a-z0-9_-]` is written as `%XX`. Distinct keys stay
/// distinct, even on case-insensitive file systems, and no separator or `..`
/// survives.
///
/// ```
/// use report_data::cache::escape_key;
///
/// assert_eq!(escape_key("daily_cost"), "daily_cost");
/// assert_eq!(escape_key("Team"), "%54eam");
/// assert_eq!(escape_key("a/b"), "a%2Fb");
/// ```
pub fn escape_key(key: &str) -> String {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    let re = RESERVED.get_or_init(|| Regex::new(r"[^a-z0-9_-]+").expect("regex is valid"));
    re.replace_all(key, |caps: &Captures| {
        caps[0].bytes().map(|b| format!("%{:02X}", b)).collect::<String>()
    })
    .into_owned()
}

// ── FileCache ─────────────────────────────────────────────────────────────────

/// One file per escaped key under `<base_dir>/<collector_name>/`.
#[derive(Debug, Clone)]
pub struct FileCache {
    enabled: bool,
    dir: PathBuf,
}

impl FileCache {
    /// Open the cache for `collector_name`, creating its directory when enabled.
    pub fn new(enabled: bool, base_dir: &Path, collector_name: &str) -> Result<Self> {
        let dir = base_dir.join(escape_key(collector_name));
        if enabled {
            info!(dir = %dir.display(), "cost collector will use cached results");
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self { enabled, dir })
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::new(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key))
    }
}

impl RawDataCache for FileCache {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(key, "cache hit");
                Some(content)
            }
            Err(e) => {
                debug!(key, error = %e, "could not load cached key");
                None
            }
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        std::fs::write(self.path_for(key), value)?;
        debug!(key, "payload cached");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_key_keeps_safe_characters() {
        assert_eq!(escape_key("monthly_cost"), "monthly_cost");
        assert_eq!(escape_key("2024-01-01"), "2024-01-01");
    }

    #[test]
    fn test_escape_key_distinguishes_case_and_punctuation() {
        let keys = ["team", "Team", "TEAM", "team name", "team_name", "team.name", "team%20name"];
        let escaped: std::collections::BTreeSet<String> =
            keys.iter().map(|k| escape_key(k).to_lowercase()).collect();
        assert_eq!(escaped.len(), keys.len());
    }

    #[test]
    fn test_escape_key_has_no_path_components() {
        let escaped = escape_key("../../etc/passwd");
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains(".."));
        assert_eq!(escape_key("\u{e9}t\u{e9}"), "%C3%A9t%C3%A9");
    }

    #[test]
    fn test_enabled_cache_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let cache = FileCache::new(true, tmp.path(), "aws").unwrap();

        assert!(cache.get("daily_cost").is_none());
        cache.save("daily_cost", r#"[{"a":1}]"#).unwrap();
        assert_eq!(cache.get("daily_cost").as_deref(), Some(r#"[{"a":1}]"#));
        assert!(tmp.path().join("aws").join("daily_cost").is_file());
    }

    #[test]
    fn test_keys_differing_by_case_do_not_share_an_entry() {
        let tmp = TempDir::new().expect("tempdir");
        let cache = FileCache::new(true, tmp.path(), "aws").unwrap();

        cache.save("Team", "upper").unwrap();
        assert!(cache.get("team").is_none());
        cache.save("team", "lower").unwrap();

        assert_eq!(cache.get("Team").as_deref(), Some("upper"));
        assert_eq!(cache.get("team").as_deref(), Some("lower"));
    }

    #[test]
    fn test_disabled_cache_never_writes_or_hits() {
        let tmp = TempDir::new().expect("tempdir");
        let cache = FileCache::new(false, tmp.path(), "aws").unwrap();

        cache.save("Daily Cost", "payload").unwrap();
        assert!(cache.get("Daily Cost").is_none());
        assert!(!tmp.path().join("aws").exists());
        assert!(!FileCache::disabled().enabled());
    }
}
