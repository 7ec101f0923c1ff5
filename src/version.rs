//! Schema version labels
//!
//! Versions are opaque strings. When the caller supplies none, the registry
//! generates a time-ordered label with a random suffix so that concurrent
//! registrations stay distinct and still sort by creation time.

use chrono::{DateTime, Utc};
use rand::Rng;
use semver::Version;

use crate::compatibility::CompatibilityReport;
use crate::error::{Result, SchemaError};

/// Generate a fresh version label for the current instant
pub fn generate() -> String {
    generate_at(Utc::now(), &mut rand::thread_rng())
}

/// `<yyyymmddHHMMSSmmm>-<6 hex digits>`
pub fn generate_at(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let suffix: u32 = rng.gen_range(0..0x100_0000);
    format!("{}-{:06x}", now.format("%Y%m%d%H%M%S%3f"), suffix)
}

/// Reject labels that cannot double as storage keys
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(SchemaError::InvalidIdentifier("version must not be empty".to_string()));
    }
    if label.starts_with('.') || label.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control()) {
        return Err(SchemaError::InvalidIdentifier(format!(
            "version '{label}' may not start with '.' or contain path separators or whitespace"
        )));
    }
    Ok(())
}

/// Next semantic version after `previous` given a compatibility verdict
///
/// Breaking reports bump the major component, anything else the minor one.
/// Returns `None` when `previous` is not a semantic version.
pub fn suggest_next(previous: &str, report: &CompatibilityReport) -> Option<String> {
    let stripped = previous.strip_prefix('v').unwrap_or(previous);
    let current = Version::parse(stripped).ok()?;
    let next = if !report.compatible {
        Version::new(current.major + 1, 0, 0)
    } else if report.changes.is_empty() {
        Version::new(current.major, current.minor, current.patch + 1)
    } else {
        Version::new(current.major, current.minor + 1, 0)
    };
    let prefix = if stripped.len() < previous.len() { "v" } else { "" };
    Some(format!("{prefix}{next}"))
}
