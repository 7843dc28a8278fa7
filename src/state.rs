//! Shared, mutex-protected process state.
//!
//! One [`ProcessState`] handle is shared between the status aggregator, the
//! background workers, and the live-state view. Lock discipline: the inner
//! lock is held only for the duration of one field update or read and never
//! across an instrument I/O call, so readers never wait on hardware.

use crate::instrument::LcrReading;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cache key under which the contact-quality worker publishes readings.
pub const CONTACT_QUALITY_KEY: &str = "contact_quality";

/// Most recent reading of a background worker, stamped at acquisition time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedReading {
    /// Acquisition time in seconds since the Unix epoch.
    pub ts: f64,
    /// Primary reading component.
    pub primary: f64,
    /// Secondary reading component.
    pub secondary: f64,
}

impl CachedReading {
    /// Wrap an impedance reading with the current wall-clock time.
    pub fn now(reading: LcrReading) -> Self {
        Self {
            ts: Utc::now().timestamp_millis() as f64 / 1e3,
            primary: reading.primary,
            secondary: reading.secondary,
        }
    }
}

/// Named status fields, fully rebuilt by every aggregator run.
///
/// A field's default (empty string, `None` payload) means the role was
/// unreachable or not configured; consumers render it as "n/a".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusSnapshot {
    /// Switching matrix identification.
    pub matrix_model: String,
    /// Display string of the matrix's closed channels.
    pub matrix_channels: String,
    /// High-voltage source identification.
    pub hvsrc_model: String,
    /// Low-voltage source identification.
    pub vsrc_model: String,
    /// Impedance meter identification.
    pub lcr_model: String,
    /// Electrometer identification.
    pub elm_model: String,
    /// Probe table identification.
    pub table_model: String,
    /// Probe table calibration summary ("CALIBRATED" / "NOT CALIBRATED").
    pub table_state: String,
    /// Environment box identification.
    pub env_model: String,
    /// Environment box bulk payload.
    pub env_pc_data: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct ProcessStateInner {
    status: StatusSnapshot,
    readings: HashMap<String, CachedReading>,
    table_enabled: bool,
    table_position: Option<(f64, f64, f64)>,
}

/// Handle to the process-wide shared state. Cloning shares the same state.
#[derive(Clone, Debug, Default)]
pub struct ProcessState {
    inner: Arc<RwLock<ProcessStateInner>>,
}

impl ProcessState {
    /// Create a fresh state with default status and no cached readings.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ProcessStateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProcessStateInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.read().status.clone()
    }

    /// Apply one short update to the status snapshot.
    ///
    /// The closure runs under the state lock; callers must not perform I/O
    /// inside it.
    pub fn update_status(&self, update: impl FnOnce(&mut StatusSnapshot)) {
        update(&mut self.write().status);
    }

    /// Overwrite the cached reading slot `key`.
    pub fn insert_reading(&self, key: &str, reading: CachedReading) {
        self.write().readings.insert(key.to_string(), reading);
    }

    /// Remove the cached reading slot `key`, if present.
    pub fn remove_reading(&self, key: &str) {
        self.write().readings.remove(key);
    }

    /// Current content of the cached reading slot `key`.
    pub fn reading(&self, key: &str) -> Option<CachedReading> {
        self.read().readings.get(key).copied()
    }

    /// Mark the table worker as enabled or disabled.
    pub fn set_table_enabled(&self, enabled: bool) {
        self.write().table_enabled = enabled;
    }

    /// Whether the table worker is enabled.
    pub fn table_enabled(&self) -> bool {
        self.read().table_enabled
    }

    /// Publish the last known table position in millimeters.
    pub fn set_table_position(&self, x: f64, y: f64, z: f64) {
        self.write().table_position = Some((x, y, z));
    }

    /// Drop the cached table position (table worker stopped).
    pub fn clear_table_position(&self) {
        self.write().table_position = None;
    }

    /// Last cached table position, if the table worker is running.
    pub fn table_position(&self) -> Option<(f64, f64, f64)> {
        self.read().table_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_slot_overwrite_and_removal() {
        let state = ProcessState::new();
        assert!(state.reading(CONTACT_QUALITY_KEY).is_none());

        let first = CachedReading {
            ts: 1.0,
            primary: 2e-12,
            secondary: 1e6,
        };
        state.insert_reading(CONTACT_QUALITY_KEY, first);
        assert_eq!(state.reading(CONTACT_QUALITY_KEY), Some(first));

        let second = CachedReading {
            ts: 2.0,
            primary: 3e-12,
            secondary: 2e6,
        };
        state.insert_reading(CONTACT_QUALITY_KEY, second);
        assert_eq!(state.reading(CONTACT_QUALITY_KEY), Some(second));

        state.remove_reading(CONTACT_QUALITY_KEY);
        assert!(state.reading(CONTACT_QUALITY_KEY).is_none());
    }

    #[test]
    fn test_clone_shares_state() {
        let state = ProcessState::new();
        let view = state.clone();
        state.update_status(|status| status.lcr_model = "E4980A".to_string());
        assert_eq!(view.status().lcr_model, "E4980A");
    }

    #[test]
    fn test_table_position_cache() {
        let state = ProcessState::new();
        assert!(!state.table_enabled());
        assert!(state.table_position().is_none());

        state.set_table_enabled(true);
        state.set_table_position(1.0, 2.0, 3.0);
        assert_eq!(state.table_position(), Some((1.0, 2.0, 3.0)));

        state.clear_table_position();
        assert!(state.table_position().is_none());
    }

    #[test]
    fn test_cached_reading_timestamp_is_current() {
        let before = Utc::now().timestamp_millis() as f64 / 1e3;
        let cached = CachedReading::now(LcrReading {
            primary: 0.0,
            secondary: 0.0,
        });
        let after = Utc::now().timestamp_millis() as f64 / 1e3;
        assert!(cached.ts >= before && cached.ts <= after);
    }
}
