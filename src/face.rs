/*
 *  face.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  The refresh state machine: decides, on each tick and each inbound
 *  message, what to recompute, persist, request, and render.
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

use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};

use crate::clock::{self, DAY_UNIT, HOUR_UNIT, MINUTE_UNIT, Tick};
use crate::companion::{
    FieldMap, KEY_CONDITIONS, KEY_TEMPERATURE, KEY_TOKEN, LinkEvent, WeatherRequester,
};
use crate::display::FaceDisplay;
use crate::persist::SlotStore;
use crate::weather::WeatherSnapshot;

/// Companion-link slice glyphs, kept from the device app.
pub const LINK_UP_GLYPH: &str = "==";
pub const LINK_DOWN_GLYPH: &str = "=/=";

/// Everything dispatched through the single event loop.
#[derive(Debug)]
pub enum Event {
    Tick(Tick),
    Companion(LinkEvent),
    /// Battery percent changed (0..=100).
    Battery(u8),
}

/// Per-device presentation settings.
#[derive(Debug, Clone, Copy)]
pub struct FaceSettings {
    pub twenty_four_hour: bool,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self { twenty_four_hour: true }
    }
}

/// The watchface context: all mutable state, owned, passed to each
/// handler. Handlers run to completion on one event at a time; nothing
/// here is shared across threads.
pub struct Watchface<D: FaceDisplay, R: WeatherRequester> {
    display: D,
    requester: R,
    store: SlotStore,
    settings: FaceSettings,
    snapshot: WeatherSnapshot,
    /// Monotonic request generation; the latest value is the only token
    /// an inbound response may carry to be accepted.
    generation: u32,
    /// Token of the outstanding request, if any.
    pending: Option<u32>,
    link_up: bool,
}

impl<D: FaceDisplay, R: WeatherRequester> Watchface<D, R> {
    pub fn new(display: D, requester: R, store: SlotStore, settings: FaceSettings) -> Self {
        Self {
            display,
            requester,
            store,
            settings,
            snapshot: WeatherSnapshot::default(),
            generation: 0,
            pending: None,
            link_up: false,
        }
    }

    /// First render after construction: version, time, and date go up
    /// unconditionally (no tick has fired yet), then the persisted
    /// weather is loaded. Absent or stale data triggers a fetch instead
    /// of a render; a load error is treated like an absent slot.
    pub fn on_startup(&mut self, now: DateTime<Local>) {
        self.display
            .render_firmware_version(&format!("v{}", env!("CARGO_PKG_VERSION")));
        self.render_time(&now);
        self.render_date(&now);

        match self.store.load() {
            Ok(Some(snapshot)) => {
                let stale = snapshot.is_stale(now.with_timezone(&Utc));
                self.snapshot = snapshot;
                if stale {
                    debug!("persisted weather is stale, requesting fresh data");
                    self.request_weather();
                } else {
                    self.render_weather();
                }
            }
            Ok(None) => {
                debug!("no persisted weather, requesting fresh data");
                self.request_weather();
            }
            Err(e) => {
                error!("failed to load persisted weather: {}", e);
                self.request_weather();
            }
        }
    }

    /// Dispatch one event-loop item to its handler.
    pub fn on_event(&mut self, event: Event) {
        match event {
            Event::Tick(tick) => self.on_tick(tick),
            Event::Battery(pct) => self.on_battery(pct),
            Event::Companion(LinkEvent::Inbound(fields)) => self.on_response(&fields, Utc::now()),
            Event::Companion(LinkEvent::Up) => self.on_link(true),
            Event::Companion(LinkEvent::Down(reason)) => {
                info!("companion link down: {}", reason);
                self.on_link(false);
            }
            Event::Companion(LinkEvent::SendFailed(reason)) => self.on_send_failed(&reason),
            Event::Companion(LinkEvent::Dropped(reason)) => self.on_dropped(&reason),
        }
    }

    /// Tick dispatch: each set unit refreshes its own display slice, and
    /// only that. An empty bitmask is a no-op.
    pub fn on_tick(&mut self, tick: Tick) {
        if tick.has(MINUTE_UNIT) {
            self.render_time(&tick.at);
        }
        if tick.has(HOUR_UNIT) {
            self.request_weather();
        }
        if tick.has(DAY_UNIT) {
            self.render_date(&tick.at);
        }
    }

    /// Ingest a companion response. A usable response carries both the
    /// temperature and conditions fields and matches the outstanding
    /// request token; anything else is discarded whole, leaving the
    /// snapshot, the store, and the display untouched.
    pub fn on_response(&mut self, fields: &FieldMap, now: DateTime<Utc>) {
        let temperature = fields.get_i32(KEY_TEMPERATURE);
        let conditions = fields.get_str(KEY_CONDITIONS);
        let (Some(temperature), Some(conditions)) = (temperature, conditions) else {
            debug!("incomplete weather response discarded");
            return;
        };

        match fields.get_u32(KEY_TOKEN) {
            Some(token) if self.pending == Some(token) => {}
            Some(token) => {
                info!("ignoring weather response for superseded request (token {})", token);
                return;
            }
            None if self.pending.is_some() => {
                warn!("companion response carries no token, accepting for outstanding request");
            }
            None => {
                debug!("unsolicited weather response discarded");
                return;
            }
        }
        self.pending = None;

        self.snapshot = WeatherSnapshot::new(temperature, conditions, now.timestamp() as u32);
        if let Err(e) = self.store.save(&self.snapshot) {
            // Keep going: the in-memory snapshot stays authoritative for
            // the rest of the session.
            error!("failed to persist weather: {}", e);
        }
        self.render_weather();
    }

    /// Outbound send failed. Terminal for this attempt: the next HOUR
    /// tick or startup staleness check is the retry mechanism.
    pub fn on_send_failed(&mut self, reason: &str) {
        error!("Outbox send failed: {}", reason);
    }

    /// Inbound message dropped before it could be parsed.
    pub fn on_dropped(&mut self, reason: &str) {
        error!("Message dropped: {}", reason);
    }

    /// Battery push notification; bypasses the tick cadence.
    pub fn on_battery(&mut self, pct: u8) {
        self.display.render_battery(&format!("{}%", pct));
    }

    /// Companion-link connectivity change; bypasses the tick cadence.
    pub fn on_link(&mut self, up: bool) {
        self.link_up = up;
        self.display
            .render_bluetooth(if up { LINK_UP_GLYPH } else { LINK_DOWN_GLYPH });
    }

    /// Last pushed link state, as rendered.
    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// Issue a weather request under a fresh generation token. Responses
    /// to any earlier token are ignored from here on.
    fn request_weather(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(self.generation);
        if let Err(e) = self.requester.request_weather(self.generation) {
            warn!("weather request not sent: {}", e);
        }
    }

    fn render_time(&mut self, now: &DateTime<Local>) {
        self.display
            .render_time(&clock::format_time(now, self.settings.twenty_four_hour));
    }

    fn render_date(&mut self, now: &DateTime<Local>) {
        self.display.render_date(&clock::format_date(now));
    }

    fn render_weather(&mut self) {
        self.display.render_weather(&self.snapshot.display_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companion::CompanionError;
    use crate::display::MockDisplay;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    static FACE_SEQ: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone, Default)]
    struct RecordingRequester {
        tokens: Arc<Mutex<Vec<u32>>>,
    }

    impl WeatherRequester for RecordingRequester {
        fn request_weather(&mut self, token: u32) -> Result<(), CompanionError> {
            self.tokens.lock().unwrap().push(token);
            Ok(())
        }
    }

    fn temp_store() -> SlotStore {
        let n = FACE_SEQ.fetch_add(1, Ordering::SeqCst);
        SlotStore::new(
            std::env::temp_dir()
                .join(format!("mooseface-face-{}-{}", std::process::id(), n))
                .join("slot56.bin"),
        )
    }

    fn new_face() -> (
        Watchface<MockDisplay, RecordingRequester>,
        Arc<Mutex<crate::display::MockDisplayState>>,
        Arc<Mutex<Vec<u32>>>,
    ) {
        let display = MockDisplay::new();
        let state = display.state();
        let requester = RecordingRequester::default();
        let tokens = Arc::clone(&requester.tokens);
        let face = Watchface::new(display, requester, temp_store(), FaceSettings::default());
        (face, state, tokens)
    }

    fn tick_at(units: u8) -> Tick {
        Tick::new(Local.with_ymd_and_hms(2025, 9, 5, 7, 5, 0).unwrap(), units)
    }

    #[test]
    fn test_tick_dispatch_matrix() {
        for units in 0u8..8 {
            let (mut face, state, tokens) = new_face();
            face.on_tick(tick_at(units));

            let state = state.lock().unwrap();
            let want_time = usize::from(units & MINUTE_UNIT != 0);
            let want_date = usize::from(units & DAY_UNIT != 0);
            let want_req = usize::from(units & HOUR_UNIT != 0);
            assert_eq!(state.time.len(), want_time, "units {:#05b}", units);
            assert_eq!(state.date.len(), want_date, "units {:#05b}", units);
            assert_eq!(tokens.lock().unwrap().len(), want_req, "units {:#05b}", units);
            // Nothing else renders off a tick.
            assert_eq!(state.weather.len(), 0, "units {:#05b}", units);
            assert_eq!(state.battery.len(), 0, "units {:#05b}", units);
            assert_eq!(state.bluetooth.len(), 0, "units {:#05b}", units);
        }
    }

    #[test]
    fn test_minute_tick_renders_stripped_time() {
        let (mut face, state, _) = new_face();
        face.on_tick(tick_at(MINUTE_UNIT));
        assert_eq!(state.lock().unwrap().time, vec!["7:05"]);
    }

    #[test]
    fn test_requests_use_fresh_tokens() {
        let (mut face, _, tokens) = new_face();
        face.on_tick(tick_at(HOUR_UNIT));
        face.on_tick(tick_at(HOUR_UNIT));
        face.on_tick(tick_at(HOUR_UNIT));
        assert_eq!(*tokens.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_battery_and_link_slices() {
        let (mut face, state, _) = new_face();
        face.on_battery(87);
        face.on_link(true);
        face.on_link(false);

        let state = state.lock().unwrap();
        assert_eq!(state.battery, vec!["87%"]);
        assert_eq!(state.bluetooth, vec![LINK_UP_GLYPH, LINK_DOWN_GLYPH]);
        assert!(!face.link_up());
    }

    #[test]
    fn test_transport_failures_change_nothing() {
        let (mut face, state, tokens) = new_face();
        face.on_send_failed("connection reset");
        face.on_dropped("bad frame");
        assert_eq!(state.lock().unwrap().total_renders(), 0);
        assert!(tokens.lock().unwrap().is_empty());
    }
}
