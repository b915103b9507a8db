// src/nomor_aju.rs

//! The 26-character document sequence identifier (NOMOR AJU).
//!
//! Layout: 12-character office/registration prefix, 8-digit date (YYYYMMDD)
//! and a 6-digit zero-padded serial.

use std::fmt;

use time::{Date, OffsetDateTime};
use tracing::warn;

pub const NOMOR_AJU_LEN: usize = 26;
const PREFIX_LEN: usize = 12;
const SERIAL_LEN: usize = 6;
const SERIAL_MODULUS: u64 = 1_000_000;

/// Seed used when the template carries no usable placeholder.
pub const FALLBACK_PLACEHOLDER: &str = "00002701069420200101000000";

/// The pieces of a template placeholder that carry over into a new identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub prefix: String,
    /// Serial from the placeholder's last six characters (0 when not numeric).
    pub serial: u64,
}

impl Placeholder {
    /// Parse a placeholder value, falling back to [`FALLBACK_PLACEHOLDER`] when
    /// it is shorter than a full identifier.
    pub fn parse(existing: &str) -> Self {
        let existing = existing.trim();
        let chars: Vec<char> = if existing.chars().count() < NOMOR_AJU_LEN {
            if !existing.is_empty() {
                warn!(placeholder = %existing, "Malformed NOMOR AJU placeholder, using fallback");
            }
            FALLBACK_PLACEHOLDER.chars().collect()
        } else {
            existing.chars().collect()
        };

        let prefix: String = chars[..PREFIX_LEN].iter().collect();
        let tail: String = chars[chars.len() - SERIAL_LEN..].iter().collect();
        let serial = if tail.chars().all(|c| c.is_ascii_digit()) {
            tail.parse().unwrap_or(0)
        } else {
            0
        };

        Self { prefix, serial }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NomorAju(String);

impl NomorAju {
    /// Assemble `prefix + YYYYMMDD + serial`. Serials past 999999 wrap so the
    /// identifier keeps its fixed width.
    pub fn compose(prefix: &str, date: Date, serial: u64) -> Self {
        let prefix: String = prefix
            .chars()
            .chain(std::iter::repeat('0'))
            .take(PREFIX_LEN)
            .collect();
        Self(format!(
            "{prefix}{:04}{:02}{:02}{:06}",
            date.year(),
            u8::from(date.month()),
            date.day(),
            serial % SERIAL_MODULUS
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NomorAju {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Today's date in local time (UTC when the local offset is unavailable).
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
