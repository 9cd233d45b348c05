/*
 *  ticker.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  Minute-granularity tick source for the refresh state machine.
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

use chrono::{Local, Timelike};
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::clock::{Tick, units_between};
use crate::face::Event;

/// Margin past the minute boundary so a tick never lands a hair early.
const BOUNDARY_SLACK_MS: u64 = 20;

/// Emit one [`Tick`] per wall-clock minute, carrying the units that
/// changed since the previous tick. The mask comes from comparing
/// consecutive readings, so a suspended process sees the boundary it
/// wakes up across, never the ones it slept through.
pub fn spawn(events: mpsc::Sender<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut prev = Local::now();
        loop {
            sleep(until_next_minute(&prev)).await;

            let now = Local::now();
            let units = units_between(&prev, &now);
            prev = now;
            if units == 0 {
                // Woke early; next iteration re-arms on the same boundary.
                continue;
            }
            debug!("tick units {:#05b} at {}", units, now.format("%H:%M"));
            if events.send(Event::Tick(Tick::new(now, units))).await.is_err() {
                return;
            }
        }
    })
}

fn until_next_minute(now: &chrono::DateTime<Local>) -> Duration {
    let into_minute =
        u64::from(now.second()) * 1000 + u64::from(now.timestamp_subsec_millis());
    Duration::from_millis(60_000u64.saturating_sub(into_minute) + BOUNDARY_SLACK_MS)
}
