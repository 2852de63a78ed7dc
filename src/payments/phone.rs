//! Uganda mobile-money number handling.
//!
//! Pure functions, used before any provider call so unsupported numbers are
//! rejected with a validation error instead of a failed charge.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Network {
    Mtn,
    Airtel,
}

const MTN_PREFIXES: [&str; 3] = ["77", "78", "76"];
const AIRTEL_PREFIXES: [&str; 3] = ["70", "75", "74"];

fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn network_for_prefix(prefix: &str) -> Option<Network> {
    if MTN_PREFIXES.contains(&prefix) {
        Some(Network::Mtn)
    } else if AIRTEL_PREFIXES.contains(&prefix) {
        Some(Network::Airtel)
    } else {
        None
    }
}

/// Detect the carrier from a local (`07…`) or international (`2567…`) number.
pub fn detect_network(phone: &str) -> Option<Network> {
    let cleaned = digits(phone);

    let prefix = if let Some(rest) = cleaned.strip_prefix("256") {
        rest.get(0..2)?
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        rest.get(0..2)?
    } else {
        return None;
    };

    network_for_prefix(prefix)
}

/// Normalize to the international `256XXXXXXXXX` form.
pub fn format_phone_number(phone: &str) -> String {
    let cleaned = digits(phone);

    if cleaned.starts_with("256") {
        cleaned
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("256{}", rest)
    } else {
        format!("256{}", cleaned)
    }
}
