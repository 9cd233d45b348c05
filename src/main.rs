/*
 *  main.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  TODO:
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

use anyhow::Context;
use chrono::Local;
use env_logger::Env;
use log::info;
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use mooseface::{
    CompanionLink, ConsoleDisplay, FaceSettings, SlotStore, Watchface, battery, config, ticker,
};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const EVENT_QUEUE: usize = 32;

/// Wait for SIGINT, SIGTERM, or SIGHUP so the face can wind down cleanly.
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    env_logger::Builder::from_env(
        Env::default().default_filter_or(cfg.log_level.as_deref().unwrap_or("info")),
    )
    .format_timestamp_secs()
    .init();

    info!("{} - worth the watch", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let store = match cfg.store_path.clone() {
        Some(path) => SlotStore::new(path),
        None => SlotStore::at_default_location().context("resolving weather slot location")?,
    };
    info!("weather slot at {}", store.path().display());

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_QUEUE);

    // Companion link comes up first so the startup fetch path has
    // somewhere to queue its request.
    let link = CompanionLink::connect(cfg.companion_addr(), event_tx.clone());

    let settings = FaceSettings {
        twenty_four_hour: cfg.twenty_four_hour(),
    };
    let mut face = Watchface::new(ConsoleDisplay::new(), link.handle(), store, settings);

    // First paint: version, time, date, weather path, then the peeked
    // push-driven slices. The link starts disconnected until it reports up.
    face.on_startup(Local::now());
    if let Some(pct) = battery::peek(&cfg.battery_capacity_path()) {
        face.on_battery(pct);
    }
    face.on_link(false);

    let capacity_path = cfg.battery_capacity_path();
    let poll = Duration::from_secs(cfg.battery_poll_secs());
    ticker::spawn(event_tx.clone());
    battery::spawn_poller(capacity_path, poll, event_tx.clone());
    drop(event_tx);

    tokio::select! {
        result = signal_handler() => {
            result?;
        }
        _ = async {
            while let Some(event) = event_rx.recv().await {
                face.on_event(event);
            }
        } => {
            info!("Closed Application Loop.");
        }
    }

    info!("Main application exiting. Stopping companion link.");
    link.shutdown().await;

    Ok(())
}
