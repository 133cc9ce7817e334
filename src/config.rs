//! `ConfigManager` (spec §5 / SPEC_FULL §2 ambient stack): loads a
//! property file plus CLI/`-D`-style overrides into an immutable
//! `ConfigSnapshot`, published behind `arc_swap::ArcSwap` so a reload is a
//! single atomic pointer swap and readers never block on it.

use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `JDBCX_HOME` / `JDBCX_CONFIG` env vars (spec §6: "Environment
/// variables. `JDBCX_HOME` (installation root), `JDBCX_CONFIG` (override
/// config path)").
pub const ENV_HOME: &str = "JDBCX_HOME";
pub const ENV_CONFIG: &str = "JDBCX_CONFIG";

/// A read-only point-in-time view of merged configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    values: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.values.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a Java-`.properties`-style file: `key=value` or `key: value`
/// lines, `#`/`!` comment lines, blank lines ignored. Intentionally does
/// not support line continuations or unicode escapes — the source's
/// config files in practice never use them.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split_at = line.find(['=', ':']);
        if let Some(idx) = split_at {
            let key = line[..idx].trim().to_string();
            let value = line[idx + 1..].trim().to_string();
            if !key.is_empty() {
                map.insert(key, value);
            }
        }
    }
    map
}

/// Resolve the config file path per spec §6: `JDBCX_CONFIG` env var if
/// set, else `$JDBCX_HOME/config.properties`, else `None` (no file to
/// load, overrides only).
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    std::env::var(ENV_HOME).ok().map(|home| Path::new(&home).join("config.properties"))
}

/// Owns the live `ConfigSnapshot` and knows how to rebuild one.
pub struct ConfigManager {
    current: ArcSwap<ConfigSnapshot>,
    path: Option<PathBuf>,
    overrides: HashMap<String, String>,
}

impl ConfigManager {
    /// Build a manager from an explicit file (if any exists) plus
    /// `-D name=value` style overrides, which always win (spec §6).
    pub fn load(path: Option<PathBuf>, overrides: HashMap<String, String>) -> Result<Self> {
        let manager = ConfigManager {
            current: ArcSwap::from_pointee(ConfigSnapshot::default()),
            path,
            overrides,
        };
        manager.reload()?;
        Ok(manager)
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Re-read the backing file (if configured) and re-merge overrides,
    /// publishing the result as a single atomic pointer swap.
    pub fn reload(&self) -> Result<()> {
        let mut values = HashMap::new();
        if let Some(path) = &self.path {
            match std::fs::read_to_string(path) {
                Ok(text) => values.extend(parse_properties(&text)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "config file not found, using overrides only");
                }
                Err(e) => return Err(Error::Config(format!("failed to read config file '{}': {e}", path.display()))),
            }
        }
        values.extend(self.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.current.store(Arc::new(ConfigSnapshot { values }));
        Ok(())
    }
}

/// Parse repeated `-D name=value` CLI flags into an overrides map (spec
/// §6: "the `-D` system properties mirror all options").
pub fn parse_overrides(flags: &[String]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for flag in flags {
        if let Some((k, v)) = flag.split_once('=') {
            out.insert(k.trim().to_string(), v.trim().to_string());
        } else {
            tracing::warn!(flag = %flag, "ignoring malformed -D override, expected name=value");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_skipping_comments_and_blanks() {
        let text = "# a comment\n\nserver.port=8080\nserver.host: localhost\n! also a comment\n";
        let map = parse_properties(text);
        assert_eq!(map.get("server.port").map(String::as_str), Some("8080"));
        assert_eq!(map.get("server.host").map(String::as_str), Some("localhost"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.properties");
        std::fs::write(&path, "server.port=8080\n").unwrap();

        let mut overrides = HashMap::new();
        overrides.insert("server.port".to_string(), "9090".to_string());

        let manager = ConfigManager::load(Some(path), overrides).unwrap();
        assert_eq!(manager.snapshot().get("server.port"), Some("9090"));
    }

    #[test]
    fn missing_config_file_falls_back_to_overrides_only() {
        let mut overrides = HashMap::new();
        overrides.insert("server.port".to_string(), "9090".to_string());
        let manager = ConfigManager::load(Some(PathBuf::from("/nonexistent/path.properties")), overrides).unwrap();
        assert_eq!(manager.snapshot().get("server.port"), Some("9090"));
    }

    #[test]
    fn reload_picks_up_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.properties");
        std::fs::write(&path, "a=1\n").unwrap();
        let manager = ConfigManager::load(Some(path.clone()), HashMap::new()).unwrap();
        assert_eq!(manager.snapshot().get("a"), Some("1"));

        std::fs::write(&path, "a=2\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.snapshot().get("a"), Some("2"));
    }

    #[test]
    fn parse_overrides_splits_on_first_equals() {
        let overrides = parse_overrides(&["name=value=with=equals".to_string(), "bad-flag".to_string()]);
        assert_eq!(overrides.get("name").map(String::as_str), Some("value=with=equals"));
        assert_eq!(overrides.len(), 1);
    }
}
