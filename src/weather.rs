/*
 *  weather.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  Last-known weather snapshot: bounded conditions text, observation
 *  timestamp, staleness rule.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use arrayvec::ArrayString;
use chrono::{DateTime, Utc};
use log::warn;

/// Maximum conditions text length in bytes. The persisted record reserves
/// one extra byte so the buffer is always NUL-terminated on disk.
pub const CONDITIONS_MAX: usize = 15;

/// A snapshot older than this many seconds is too old to display without
/// refreshing. Strictly greater-than: an age of exactly one hour is fresh.
pub const STALE_AFTER_SECS: i64 = 3600;

/// The single cached weather reading. Fields are jointly valid: a snapshot
/// is only ever replaced wholesale from a complete companion response (or
/// a complete persisted record), never mutated field-by-field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSnapshot {
    /// Unix time (UTC, whole seconds) of the last successful fetch.
    pub observed_at: u32,
    /// Degrees Fahrenheit.
    pub temperature_f: i32,
    /// Short human-readable label, at most [`CONDITIONS_MAX`] bytes.
    pub conditions: ArrayString<CONDITIONS_MAX>,
}

impl Default for WeatherSnapshot {
    /// Sentinel shown to nobody: it predates any real observation, so the
    /// startup path always treats it as stale and fetches.
    fn default() -> Self {
        Self::new(42, "Moose", 0)
    }
}

impl WeatherSnapshot {
    /// Build a snapshot, bounding the conditions text to fit the fixed
    /// buffer. Oversized text is truncated at a character boundary and
    /// logged; a shortened label beats discarding a valid temperature.
    pub fn new(temperature_f: i32, conditions: &str, observed_at: u32) -> Self {
        Self {
            observed_at,
            temperature_f,
            conditions: bounded_conditions(conditions),
        }
    }

    /// Age of this snapshot in seconds relative to `now`. An observation
    /// timestamp in the future counts as age zero.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now.timestamp() - self.observed_at as i64).max(0)
    }

    /// Whether this snapshot is too old to display without refreshing.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age_secs(now) > STALE_AFTER_SECS
    }

    /// The single rendered weather slice, e.g. `72°F Cloudy`.
    pub fn display_string(&self) -> String {
        format!("{}°F {}", self.temperature_f, self.conditions)
    }
}

/// Bounded copy of `raw` into the fixed conditions buffer. Truncates at a
/// `char` boundary; multi-byte characters are never split.
fn bounded_conditions(raw: &str) -> ArrayString<CONDITIONS_MAX> {
    match ArrayString::from(raw) {
        Ok(text) => text,
        Err(_) => {
            let mut text = ArrayString::new();
            for ch in raw.chars() {
                if text.try_push(ch).is_err() {
                    break;
                }
            }
            warn!(
                "conditions text truncated to {} bytes: {:?}",
                text.len(),
                raw
            );
            text
        }
    }
}
