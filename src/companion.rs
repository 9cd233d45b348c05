/*
 *  companion.rs
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

//! Request/response channel to the paired companion bridge.
//!
//! Wire format is one JSON object per line over TCP. An outbound weather
//! request is a marker field plus the generation token of the request;
//! an inbound response is a field map expected to carry `Temperature`
//! and `Conditions`. Everything else on the wire is tolerated and
//! reported, never fatal.

use log::{debug, info, warn};
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::face::Event;

/// Field keys on the companion wire.
pub const KEY_REQUEST: &str = "Request";
pub const KEY_TOKEN: &str = "Token";
pub const KEY_TEMPERATURE: &str = "Temperature";
pub const KEY_CONDITIONS: &str = "Conditions";

const OUTBOUND_QUEUE: usize = 8;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Error type for companion operations.
#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("inbound message is not a JSON object")]
    NotAnObject,
    #[error("inbound message is not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
    #[error("outbound queue is full")]
    QueueFull,
    #[error("companion link task is gone")]
    LinkClosed,
}

/// One inbound message: a map from field name to value. Extraction is
/// tolerant of companions that send numbers as strings.
#[derive(Debug, Clone, Default)]
pub struct FieldMap(pub Map<String, Value>);

impl FieldMap {
    pub fn from_line(line: &str) -> Result<Self, CompanionError> {
        match serde_json::from_str::<Value>(line)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(CompanionError::NotAnObject),
        }
    }

    fn numeric(&self, key: &str) -> Option<i64> {
        let v = self.0.get(key)?;
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.numeric(key).and_then(|n| i32::try_from(n).ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.numeric(key).and_then(|n| u32::try_from(n).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Events the link task reports back into the face's event loop.
#[derive(Debug)]
pub enum LinkEvent {
    /// A parsed inbound field map.
    Inbound(FieldMap),
    /// Connection to the bridge established.
    Up,
    /// Connection lost; the task keeps reconnecting.
    Down(String),
    /// An enqueued outbound message could not be written.
    SendFailed(String),
    /// An inbound message arrived but could not be parsed.
    Dropped(String),
}

/// Outbound port the face uses to ask for weather. Kept as a trait so
/// tests can substitute a recording implementation.
pub trait WeatherRequester: Send {
    /// Enqueue a single marker request carrying `token`. Fire-and-forget:
    /// returns once the message is queued, not once it is on the wire.
    fn request_weather(&mut self, token: u32) -> Result<(), CompanionError>;
}

/// Cheap cloneable sender half of the link.
#[derive(Debug, Clone)]
pub struct CompanionHandle {
    outbound_tx: mpsc::Sender<String>,
}

impl WeatherRequester for CompanionHandle {
    fn request_weather(&mut self, token: u32) -> Result<(), CompanionError> {
        let line = json!({ KEY_REQUEST: 0, KEY_TOKEN: token }).to_string();
        self.outbound_tx.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => CompanionError::QueueFull,
            TrySendError::Closed(_) => CompanionError::LinkClosed,
        })
    }
}

/// Background task owning the TCP connection to the companion bridge.
/// Reconnects with a fixed backoff and reports transitions, inbound
/// messages, and send failures as [`Event`]s. The face never touches the
/// socket.
pub struct CompanionLink {
    handle: CompanionHandle,
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CompanionLink {
    /// Spawn the link task. Connection establishment happens in the
    /// background; the caller gets a usable handle immediately.
    pub fn connect(addr: String, events: mpsc::Sender<Event>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task = tokio::spawn(run_link(addr, events, outbound_rx, stop_rx));
        Self {
            handle: CompanionHandle { outbound_tx },
            stop_tx,
            task,
        }
    }

    pub fn handle(&self) -> CompanionHandle {
        self.handle.clone()
    }

    /// Stop the task and wait for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.task.await;
    }
}

async fn run_link(
    addr: String,
    events: mpsc::Sender<Event>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        let connect = tokio::select! {
            _ = stop_rx.recv() => return,
            c = TcpStream::connect(addr.as_str()) => c,
        };
        let stream = match connect {
            Ok(stream) => stream,
            Err(e) => {
                debug!("companion bridge unreachable at {}: {}", addr, e);
                tokio::select! {
                    _ = stop_rx.recv() => return,
                    _ = sleep(RECONNECT_BACKOFF) => {}
                }
                continue;
            }
        };

        info!("companion link established to {}", addr);
        if events.send(Event::Companion(LinkEvent::Up)).await.is_err() {
            return;
        }

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let reason: String = loop {
            tokio::select! {
                _ = stop_rx.recv() => return,

                queued = outbound_rx.recv() => {
                    // All senders gone means the application is done.
                    let Some(line) = queued else { return };
                    match write_line(&mut write_half, &line).await {
                        Ok(()) => info!("outbox send success"),
                        Err(e) => {
                            let _ = events
                                .send(Event::Companion(LinkEvent::SendFailed(e.to_string())))
                                .await;
                            break e.to_string();
                        }
                    }
                }

                inbound = lines.next_line() => match inbound {
                    Ok(Some(text)) => match FieldMap::from_line(&text) {
                        Ok(fields) => {
                            if events.send(Event::Companion(LinkEvent::Inbound(fields))).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = events
                                .send(Event::Companion(LinkEvent::Dropped(e.to_string())))
                                .await;
                        }
                    },
                    Ok(None) => break "companion closed the connection".to_string(),
                    Err(e) => break e.to_string(),
                },
            }
        };

        warn!("companion link lost: {}", reason);
        if events
            .send(Event::Companion(LinkEvent::Down(reason)))
            .await
            .is_err()
        {
            return;
        }

        tokio::select! {
            _ = stop_rx.recv() => return,
            _ = sleep(RECONNECT_BACKOFF) => {}
        }
    }
}

async fn write_line(write_half: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    write_half.write_all(line.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await
}
