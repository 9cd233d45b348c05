/*
 *  battery.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  Battery level from /sys, pushed into the event loop on change.
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

use log::debug;
use std::fs;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::face::Event;

/// Read the current charge percent from a sysfs capacity file. Returns
/// `None` on any read/parse problem or an out-of-range value; battery is
/// a best-effort slice and failures degrade silently.
pub fn peek(capacity_path: &str) -> Option<u8> {
    let content = match fs::read_to_string(capacity_path) {
        Ok(content) => content,
        Err(e) => {
            debug!("battery capacity unreadable at {}: {}", capacity_path, e);
            return None;
        }
    };
    match content.split_whitespace().next().and_then(|s| s.parse::<u8>().ok()) {
        Some(pct) if pct <= 100 => Some(pct),
        _ => {
            debug!("battery capacity file held no percent: {:?}", content.trim());
            None
        }
    }
}

/// Poll the capacity file and emit an [`Event::Battery`] only when the
/// value changes. The startup render comes from a direct [`peek`]; this
/// task covers every change after that.
pub fn spawn_poller(
    capacity_path: String,
    interval: Duration,
    events: mpsc::Sender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = peek(&capacity_path);
        loop {
            sleep(interval).await;
            let current = peek(&capacity_path);
            if let Some(pct) = current {
                if current != last && events.send(Event::Battery(pct)).await.is_err() {
                    return;
                }
                last = current;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BATT_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn write_capacity(contents: &str) -> String {
        let n = BATT_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "mooseface-batt-{}-{}",
            std::process::id(),
            n
        ));
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_peek_reads_percent() {
        assert_eq!(peek(&write_capacity("87\n")), Some(87));
        assert_eq!(peek(&write_capacity("0")), Some(0));
        assert_eq!(peek(&write_capacity("100\n")), Some(100));
    }

    #[test]
    fn test_peek_rejects_garbage() {
        assert_eq!(peek(&write_capacity("moose")), None);
        assert_eq!(peek(&write_capacity("150")), None);
        assert_eq!(peek(&write_capacity("")), None);
        assert_eq!(peek("/nonexistent/capacity"), None);
    }
}
