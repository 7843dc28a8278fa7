//! Read-only live-state view for external transports.
//!
//! [`LiveState`] is the contract an HTTP (or other) transport layer consumes
//! to serve the latest cached values. Every accessor reads shared state
//! under a short lock: nothing here blocks on hardware or triggers a new
//! query, and absent values surface as `None`/`null`, never as zeros.

use crate::state::{ProcessState, CONTACT_QUALITY_KEY};
use serde_json::{json, Value};

/// Read-only view over the shared process state.
#[derive(Clone, Debug)]
pub struct LiveState {
    state: ProcessState,
}

impl LiveState {
    /// Create a view over `state`.
    pub fn new(state: ProcessState) -> Self {
        Self { state }
    }

    /// Whether the table worker is enabled.
    pub fn table_enabled(&self) -> bool {
        self.state.table_enabled()
    }

    /// Last cached table position in millimeters, or `None` while the table
    /// worker is not running.
    pub fn table_position(&self) -> Option<(f64, f64, f64)> {
        self.state.table_position()
    }

    /// Latest contact-quality pair `(cp, rp)`, or `(None, None)` while the
    /// contact-quality worker is not publishing.
    pub fn contact_quality(&self) -> (Option<f64>, Option<f64>) {
        match self.state.reading(CONTACT_QUALITY_KEY) {
            Some(reading) => (Some(reading.primary), Some(reading.secondary)),
            None => (None, None),
        }
    }

    /// Body of the `GET /table` live API response.
    pub fn table_json(&self) -> Value {
        let (x, y, z) = match self.table_position() {
            Some((x, y, z)) => (Some(x), Some(y), Some(z)),
            None => (None, None, None),
        };
        let (cp, rp) = self.contact_quality();
        json!({
            "table": {
                "enabled": self.table_enabled(),
                "position": {
                    "x": quantity(x, "mm"),
                    "y": quantity(y, "mm"),
                    "z": quantity(z, "mm"),
                },
                "contact_quality": {
                    "cp": quantity(cp, "F"),
                    "rp": quantity(rp, "Ohm"),
                },
            }
        })
    }
}

fn quantity(value: Option<f64>, unit: &str) -> Value {
    json!({ "value": value, "unit": unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CachedReading;

    #[test]
    fn test_contact_quality_absent_is_none_not_zero() {
        let live = LiveState::new(ProcessState::new());
        assert_eq!(live.contact_quality(), (None, None));
    }

    #[test]
    fn test_contact_quality_present() {
        let state = ProcessState::new();
        state.insert_reading(
            CONTACT_QUALITY_KEY,
            CachedReading {
                ts: 1.0,
                primary: 2e-12,
                secondary: 1e6,
            },
        );
        let live = LiveState::new(state);
        assert_eq!(live.contact_quality(), (Some(2e-12), Some(1e6)));
    }

    #[test]
    fn test_table_json_nulls_when_idle() {
        let live = LiveState::new(ProcessState::new());
        let body = live.table_json();
        assert_eq!(body["table"]["enabled"], json!(false));
        assert_eq!(body["table"]["position"]["x"]["value"], Value::Null);
        assert_eq!(body["table"]["position"]["x"]["unit"], json!("mm"));
        assert_eq!(body["table"]["contact_quality"]["cp"]["value"], Value::Null);
        assert_eq!(body["table"]["contact_quality"]["rp"]["unit"], json!("Ohm"));
    }
}
