/*
 *  display.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  Narrow render interface consumed by the watchface core, plus a
 *  console-backed implementation and a recording mock for tests.
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

use log::info;
use std::sync::{Arc, Mutex};

/// Presentation surface for the watchface. Each call replaces one display
/// slice wholesale and is fire-and-forget: implementations must not fail
/// back into the core, and the core never reads the display.
///
/// Pixel layout, fonts, and flushing cadence are the implementation's
/// business; the core only decides WHEN a slice changes and WHAT it says.
pub trait FaceDisplay: Send {
    /// Time-of-day slice, e.g. `7:05`.
    fn render_time(&mut self, text: &str);

    /// Date slice, e.g. `Fri 5 Sep`.
    fn render_date(&mut self, text: &str);

    /// Weather slice, e.g. `72°F Cloudy`.
    fn render_weather(&mut self, text: &str);

    /// Battery slice, e.g. `87%`.
    fn render_battery(&mut self, text: &str);

    /// Companion-link slice: `==` connected, `=/=` disconnected.
    fn render_bluetooth(&mut self, text: &str);

    /// Version line, rendered once at startup.
    fn render_firmware_version(&mut self, text: &str);
}

/// Log-backed display for running headless or on a terminal. One line per
/// slice update keeps journald output greppable.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl FaceDisplay for ConsoleDisplay {
    fn render_time(&mut self, text: &str) {
        info!("time     | {}", text);
    }

    fn render_date(&mut self, text: &str) {
        info!("date     | {}", text);
    }

    fn render_weather(&mut self, text: &str) {
        info!("weather  | {}", text);
    }

    fn render_battery(&mut self, text: &str) {
        info!("battery  | {}", text);
    }

    fn render_bluetooth(&mut self, text: &str) {
        info!("link     | {}", text);
    }

    fn render_firmware_version(&mut self, text: &str) {
        info!("firmware | {}", text);
    }
}

/// Recorded render history, shared for inspection in tests.
#[derive(Debug, Default)]
pub struct MockDisplayState {
    pub time: Vec<String>,
    pub date: Vec<String>,
    pub weather: Vec<String>,
    pub battery: Vec<String>,
    pub bluetooth: Vec<String>,
    pub firmware: Vec<String>,
}

impl MockDisplayState {
    /// Total render calls across every slice.
    pub fn total_renders(&self) -> usize {
        self.time.len()
            + self.date.len()
            + self.weather.len()
            + self.battery.len()
            + self.bluetooth.len()
            + self.firmware.len()
    }
}

/// Mock display for testing without hardware or a terminal. Records every
/// render call; tests inspect counts and last values through `state()`.
#[derive(Debug, Clone, Default)]
pub struct MockDisplay {
    state: Arc<Mutex<MockDisplayState>>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded history.
    pub fn state(&self) -> Arc<Mutex<MockDisplayState>> {
        Arc::clone(&self.state)
    }

    /// Clear recorded history (useful between test phases).
    pub fn reset_state(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockDisplayState::default();
    }
}

impl FaceDisplay for MockDisplay {
    fn render_time(&mut self, text: &str) {
        self.state.lock().unwrap().time.push(text.to_string());
    }

    fn render_date(&mut self, text: &str) {
        self.state.lock().unwrap().date.push(text.to_string());
    }

    fn render_weather(&mut self, text: &str) {
        self.state.lock().unwrap().weather.push(text.to_string());
    }

    fn render_battery(&mut self, text: &str) {
        self.state.lock().unwrap().battery.push(text.to_string());
    }

    fn render_bluetooth(&mut self, text: &str) {
        self.state.lock().unwrap().bluetooth.push(text.to_string());
    }

    fn render_firmware_version(&mut self, text: &str) {
        self.state.lock().unwrap().firmware.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_each_slice() {
        let mut display = MockDisplay::new();
        display.render_time("7:05");
        display.render_time("7:06");
        display.render_weather("72°F Cloudy");

        let state = display.state();
        let state = state.lock().unwrap();
        assert_eq!(state.time, vec!["7:05", "7:06"]);
        assert_eq!(state.weather, vec!["72°F Cloudy"]);
        assert_eq!(state.total_renders(), 3);
    }

    #[test]
    fn test_mock_reset_state() {
        let mut display = MockDisplay::new();
        display.render_date("Fri 5 Sep");
        display.reset_state();
        assert_eq!(display.state().lock().unwrap().total_renders(), 0);
    }

    #[test]
    fn test_mock_clones_share_state() {
        let display = MockDisplay::new();
        let mut other = display.clone();
        other.render_battery("87%");
        assert_eq!(display.state().lock().unwrap().battery, vec!["87%"]);
    }
}
