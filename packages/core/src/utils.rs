// ABOUTME: Shared utility functions for DroneGuide
// ABOUTME: ID generation, image payload fingerprinting and data URL handling

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const BASE36_CHARS: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
    'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Generate a project ID in the `proj-<base36 millis>-<random>` format
pub fn generate_project_id() -> String {
    format!("proj-{}-{}", base36(now_millis()), nanoid::nanoid!(9, &BASE36_CHARS))
}

/// Generate a per-installation user ID
pub fn generate_user_id() -> String {
    format!("user_{}_{}", now_millis(), nanoid::nanoid!(9, &BASE36_CHARS))
}

/// Generate an image generation task ID.
///
/// The nanoid suffix carries ~126 bits of randomness, so collisions are not a
/// practical concern even within the same millisecond.
pub fn generate_task_id() -> String {
    format!("gen-{}-{}", now_millis(), nanoid::nanoid!())
}

/// Generate an ID used to correlate a proxied request in logs
pub fn generate_request_id() -> String {
    format!("req-{}-{}", now_millis(), nanoid::nanoid!(9, &BASE36_CHARS))
}

fn data_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^data:image/(png|jpeg|jpg);base64,").expect("data URL pattern is valid")
    })
}

/// Strip a `data:image/...;base64,` prefix from a captured frame, if present
pub fn strip_data_url_prefix(payload: &str) -> &str {
    match data_url_pattern().find(payload) {
        Some(m) => &payload[m.end()..],
        None => payload,
    }
}

/// Stable fingerprint of an image payload used in cache keys
pub fn fingerprint(payload: &str) -> String {
    let digest = Sha256::digest(strip_data_url_prefix(payload).as_bytes());
    digest
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Truncate a string to at most `max_chars` characters
pub fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
