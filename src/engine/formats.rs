//! Built-in string formats

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;

use crate::plugins::{CustomFormat, FormatRegistry};

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid format regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
}

fn uuid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
}

fn uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[A-Za-z][A-Za-z0-9+.-]*:[^\s]+$")
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?i)(https?|ftp)://[^\s/?#]+[^\s]*$")
}

fn hostname_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?i)[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$")
}

pub fn is_email(s: &str) -> bool {
    email_regex().is_match(s)
}

pub fn is_uuid(s: &str) -> bool {
    uuid_regex().is_match(s)
}

pub fn is_uri(s: &str) -> bool {
    uri_regex().is_match(s)
}

pub fn is_url(s: &str) -> bool {
    url_regex().is_match(s)
}

pub fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

pub fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

pub fn is_time(s: &str) -> bool {
    ["%H:%M:%S", "%H:%M:%S%.f"].iter().any(|f| NaiveTime::parse_from_str(s, f).is_ok())
}

pub fn is_hostname(s: &str) -> bool {
    s.len() <= 253 && hostname_regex().is_match(s)
}

/// Install every built-in format into `registry`
pub fn register_builtins(registry: &mut FormatRegistry) {
    registry
        .register(
            "email",
            CustomFormat::new(is_email, "must be a valid email address")
                .with_sample_variants(|n| match n {
                    0 => Value::from("user@example.com"),
                    n => Value::from(format!("user{n}@example.com")),
                }),
        )
        .register(
            "uuid",
            CustomFormat::new(is_uuid, "must be a valid UUID").with_sample_variants(|n| {
                let node = (0x4266_1417_4000u64 + n as u64) & 0xffff_ffff_ffff;
                Value::from(format!("123e4567-e89b-12d3-a456-{node:012x}"))
            }),
        )
        .register(
            "uri",
            CustomFormat::new(is_uri, "must be a valid URI").with_sample_variants(web_sample),
        )
        .register(
            "url",
            CustomFormat::new(is_url, "must be a valid URL").with_sample_variants(web_sample),
        )
        .register(
            "date",
            CustomFormat::new(is_date, "must be a valid date (YYYY-MM-DD)").with_sample_variants(|n| {
                Value::from(sample_instant(n as i64 * 86_400).format("%Y-%m-%d").to_string())
            }),
        )
        .register(
            "date-time",
            CustomFormat::new(is_date_time, "must be a valid RFC 3339 date-time").with_sample_variants(|n| {
                Value::from(sample_instant(n as i64).to_rfc3339_opts(SecondsFormat::Secs, true))
            }),
        )
        .register(
            "time",
            CustomFormat::new(is_time, "must be a valid time (HH:MM:SS)").with_sample_variants(|n| {
                let secs = (12 * 3600 + n) % 86_400;
                Value::from(format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60))
            }),
        )
        .register(
            "ipv4",
            CustomFormat::new(|s| s.parse::<Ipv4Addr>().is_ok(), "must be a valid IPv4 address")
                .with_sample_variants(|n| {
                    let base = u32::from(Ipv4Addr::new(192, 168, 0, 1));
                    Value::from(Ipv4Addr::from(base.wrapping_add(n as u32)).to_string())
                }),
        )
        .register(
            "ipv6",
            CustomFormat::new(|s| s.parse::<Ipv6Addr>().is_ok(), "must be a valid IPv6 address")
                .with_sample_variants(|n| Value::from(Ipv6Addr::from(1u128 + n as u128).to_string())),
        )
        .register(
            "hostname",
            CustomFormat::new(is_hostname, "must be a valid hostname")
                .with_sample_variants(|n| match n {
                    0 => Value::from("example.com"),
                    n => Value::from(format!("host{n}.example.com")),
                }),
        );
}

fn web_sample(variant: usize) -> Value {
    match variant {
        0 => Value::from("https://example.com"),
        n => Value::from(format!("https://example.com/{n}")),
    }
}

/// 2024-01-01T00:00:00Z shifted by `offset` seconds
fn sample_instant(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200 + offset, 0)
        .single()
        .unwrap_or_default()
}
