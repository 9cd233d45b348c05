/*
 *  persist.rs
 *
 *  MooseFace - worth the watch
 *  (c) 2020-26 Stuart Hunter
 *
 *  Durable single-slot store for the last-known weather snapshot.
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
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::weather::WeatherSnapshot;

/// Fixed identity of the one persisted record, kept from the device app.
pub const SLOT_KEY: u32 = 56;

/// On-disk record, little-endian throughout:
/// `observed_at: u32 | temperature_f: i32 | conditions: [u8; 16]`
/// with the conditions buffer NUL-padded (at most 15 text bytes).
const RECORD_LEN: usize = 24;
const CONDITIONS_BUF: usize = 16;

/// Error type for slot load/save. Nothing here is fatal to the process;
/// callers log and keep the in-memory snapshot authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad record length: expected 24 bytes, got {0}")]
    BadLength(usize),
    #[error("conditions buffer is not NUL-terminated")]
    MissingNul,
    #[error("conditions text is not valid UTF-8")]
    BadText,
    #[error("no usable data directory for the weather slot")]
    NoDataDir,
}

/// Durable single-slot store. One fixed-identity record, overwritten
/// wholesale on every save; no versioning, no migration.
#[derive(Debug, Clone)]
pub struct SlotStore {
    path: PathBuf,
}

impl SlotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the default slot location under the user data dir,
    /// e.g. `~/.local/share/mooseface/slot56.bin`.
    pub fn at_default_location() -> Result<Self, StoreError> {
        let base = dirs_next::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self::new(
            base.join("mooseface").join(format!("slot{}.bin", SLOT_KEY)),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the slot. `Ok(None)` if it was never written.
    pub fn load(&self) -> Result<Option<WeatherSnapshot>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode(&raw).map(Some)
    }

    /// Overwrite the slot with `snapshot`. Write-then-rename so a crash
    /// mid-write never leaves a torn record behind.
    pub fn save(&self, snapshot: &WeatherSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, encode(snapshot))?;
        fs::rename(&tmp, &self.path)?;
        debug!("weather slot saved to {}", self.path.display());
        Ok(())
    }
}

fn encode(snapshot: &WeatherSnapshot) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[0..4].copy_from_slice(&snapshot.observed_at.to_le_bytes());
    buf[4..8].copy_from_slice(&snapshot.temperature_f.to_le_bytes());
    let text = snapshot.conditions.as_bytes();
    buf[8..8 + text.len()].copy_from_slice(text);
    buf
}

fn decode(raw: &[u8]) -> Result<WeatherSnapshot, StoreError> {
    if raw.len() != RECORD_LEN {
        return Err(StoreError::BadLength(raw.len()));
    }
    let observed_at = u32::from_le_bytes(raw[0..4].try_into().map_err(|_| StoreError::BadLength(raw.len()))?);
    let temperature_f = i32::from_le_bytes(raw[4..8].try_into().map_err(|_| StoreError::BadLength(raw.len()))?);

    let cond = &raw[8..8 + CONDITIONS_BUF];
    let nul = cond
        .iter()
        .position(|&b| b == 0)
        .ok_or(StoreError::MissingNul)?;
    let text = std::str::from_utf8(&cond[..nul]).map_err(|_| StoreError::BadText)?;
    let conditions = ArrayString::from(text).map_err(|_| StoreError::BadText)?;

    Ok(WeatherSnapshot {
        observed_at,
        temperature_f,
        conditions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static SLOT_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn temp_store() -> SlotStore {
        let n = SLOT_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "mooseface-test-{}-{}",
            std::process::id(),
            n
        ));
        SlotStore::new(path.join(format!("slot{}.bin", SLOT_KEY)))
    }

    #[test]
    fn test_load_absent_slot() {
        let store = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_roundtrip() {
        let store = temp_store();
        for snap in [
            WeatherSnapshot::new(72, "Cloudy", 1_757_000_000),
            WeatherSnapshot::new(-40, "Blizzard", 1),
            WeatherSnapshot::new(0, "", 0),
            WeatherSnapshot::new(99, "Partly Cloudy.", u32::MAX),
        ] {
            store.save(&snap).unwrap();
            assert_eq!(store.load().unwrap(), Some(snap));
        }
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let store = temp_store();
        store
            .save(&WeatherSnapshot::new(72, "Cloudy", 100))
            .unwrap();
        let next = WeatherSnapshot::new(3, "Fog", 200);
        store.save(&next).unwrap();
        assert_eq!(store.load().unwrap(), Some(next));
    }

    #[test]
    fn test_record_layout_is_24_bytes_le() {
        let snap = WeatherSnapshot::new(0x0102_0304, "Hi", 0x0A0B_0C0D);
        let raw = encode(&snap);
        assert_eq!(raw.len(), RECORD_LEN);
        assert_eq!(&raw[0..4], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&raw[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&raw[8..10], b"Hi");
        assert!(raw[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_rejects_short_record() {
        let store = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), [0u8; 12]).unwrap();
        assert!(matches!(store.load(), Err(StoreError::BadLength(12))));
    }

    #[test]
    fn test_load_rejects_missing_nul() {
        let store = temp_store();
        let mut raw = [0u8; RECORD_LEN];
        raw[8..24].fill(b'x');
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), raw).unwrap();
        assert!(matches!(store.load(), Err(StoreError::MissingNul)));
    }

    #[test]
    fn test_load_rejects_invalid_utf8() {
        let store = temp_store();
        let mut raw = [0u8; RECORD_LEN];
        raw[8] = 0xFF;
        raw[9] = 0xFE;
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), raw).unwrap();
        assert!(matches!(store.load(), Err(StoreError::BadText)));
    }
}
