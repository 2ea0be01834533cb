//! Environment loading helpers.
//!
//! Keeps the primary-key → alias fallback chain in one place so callers do not
//! repeat `or_else` ladders around `std::env::var`.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use super::env_keys::worker;
use super::schema::DEFAULT_SECRET_KEYS;

/// Load `.env` from the current directory into the process environment.
///
/// Existing variables are never overwritten, and worker credentials
/// (see [`secret_key_names`]) are never exported: workers inherit this
/// environment. Runs at most once per process.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        let Ok(content) = std::fs::read_to_string(&path) else {
            return;
        };
        let pairs: Vec<(String, String)> = parse_env_lines(&content).collect();
        let configured = env::var(worker::CLAWLITE_SECRET_KEYS).ok().or_else(|| {
            pairs
                .iter()
                .find(|(k, _)| k == worker::CLAWLITE_SECRET_KEYS)
                .map(|(_, v)| v.clone())
        });
        let secrets = secret_key_names(configured.as_deref());
        for (key, value) in pairs {
            if secrets.contains(&key) {
                continue;
            }
            if env::var(&key).is_err() {
                env::set_var(&key, value);
            }
        }
    });
}

/// Credential names from a comma separated list, or the defaults.
pub fn secret_key_names(configured: Option<&str>) -> Vec<String> {
    let parsed: Vec<String> = configured
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if parsed.is_empty() {
        DEFAULT_SECRET_KEYS.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}

/// Read only the requested keys from an env file, without exporting anything
/// into the process environment.
///
/// Used for credentials that must reach the worker over stdin only. A missing
/// file yields an empty map.
pub fn read_env_file(path: &Path, keys: &[String]) -> BTreeMap<String, String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        tracing::debug!(path = %path.display(), "env file not found, no secrets loaded");
        return BTreeMap::new();
    };
    parse_env_lines(&content)
        .filter(|(k, v)| !v.is_empty() && keys.iter().any(|want| want == k))
        .collect()
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments and stripping a
/// single layer of matching quotes.
fn parse_env_lines(content: &str) -> impl Iterator<Item = (String, String)> + '_ {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let eq_pos = line.find('=')?;
        let key = line[..eq_pos].trim();
        let raw = line[eq_pos + 1..].trim();
        let quote = raw.chars().next().filter(|c| *c == '"' || *c == '\'');
        let value = match quote {
            // Quoted: everything up to the closing quote, trailing comment ignored
            Some(q) => match raw[1..].find(q) {
                Some(end) => &raw[1..1 + end],
                None => raw,
            },
            None => match raw.find('#') {
                Some(hash_pos) => raw[..hash_pos].trim_end(),
                None => raw,
            },
        };
        if key.is_empty() {
            None
        } else {
            Some((key.to_string(), value.to_string()))
        }
    })
}

/// Read the primary variable or the first set alias; fall back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read the primary variable or the first set alias. Empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Parse a boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases) {
        Some(s) => !matches!(
            s.to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse an unsigned integer variable. Unparseable values are reported and
/// replaced by `default`.
pub fn env_u64(primary: &str, aliases: &[&str], default: u64) -> u64 {
    match env_optional(primary, aliases) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!(key = primary, value = %raw, default, "invalid integer, using default");
            default
        }),
        None => default,
    }
}
