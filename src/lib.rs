//! Core library for the MooseFace watchface daemon.
//!
//! This crate defines:
//! - The refresh state machine driving time/date/weather updates
//! - The persisted weather snapshot and its single-slot store
//! - The companion request/response channel and its wire field maps
//! - The narrow display interface the core renders through
//!
//! It is used by the `mooseface` binary, and the split keeps the whole
//! state machine reachable from integration tests.

pub mod battery;
pub mod clock;
pub mod companion;
pub mod config;
pub mod display;
pub mod face;
pub mod persist;
pub mod ticker;
pub mod weather;

pub use companion::{CompanionHandle, CompanionLink, FieldMap, LinkEvent, WeatherRequester};
pub use config::{Config, ConfigError};
pub use display::{ConsoleDisplay, FaceDisplay, MockDisplay};
pub use face::{Event, FaceSettings, Watchface};
pub use persist::{SlotStore, StoreError};
pub use weather::WeatherSnapshot;
