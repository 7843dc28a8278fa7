//! Atomic instrument capability traits.
//!
//! Instead of a deep driver class hierarchy, each hardware role implements
//! the small set of capabilities its instrument actually supports:
//!
//! - A source-measure unit implements: `Instrument + SourceMeter`
//! - An impedance meter implements: `Instrument + LcrMeter`
//! - An electrometer implements: `Instrument + Electrometer`
//! - A switching matrix implements: `Instrument + SwitchingMatrix`
//!
//! A concrete driver composes whichever traits its hardware supports,
//! selected by configuration. The traits carry no I/O logic of their own;
//! command encoding is the driver's concern.
//!
//! # Design
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses the crate error taxonomy (`AppResult`)
//! - Models one hardware role

use crate::error::{AppResult, ProbeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound accepted for a source-measure filter count.
pub const FILTER_COUNT_MAX: u32 = 100;

/// Per-axis calibration-done sentinel reported by the table controller when
/// an axis completed both its calibration and range-measure cycles.
pub const CALDONE_COMPLETE: u8 = 3;

/// One entry from an instrument's error queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentError {
    /// Device-reported error code.
    pub code: i32,
    /// Device-reported error message.
    pub message: String,
}

impl From<InstrumentError> for ProbeError {
    fn from(err: InstrumentError) -> Self {
        ProbeError::Instrument {
            code: err.code,
            message: err.message,
        }
    }
}

/// Output relay state of a source-measure unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputState {
    /// Output relay closed, source active.
    On,
    /// Output relay open.
    Off,
}

/// Quantity a source-measure unit sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFunction {
    /// Source voltage, measure current.
    Voltage,
    /// Source current, measure voltage.
    Current,
}

/// Sense wiring mode (2-wire local or 4-wire remote).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenseMode {
    /// 2-wire sensing at the output terminals.
    Local,
    /// 4-wire sensing through the sense leads.
    Remote,
}

/// Active terminal pair of a source-measure unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    /// Front-panel terminals.
    Front,
    /// Rear-panel terminals.
    Rear,
}

/// Averaging filter algorithm of a source-measure unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    /// Collect a full window for every reading.
    Repeat,
    /// Sliding window across readings.
    Moving,
}

/// Source range selection: a fixed full-scale value or autoranging.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SourceRange {
    /// Let the instrument pick the range.
    Auto,
    /// Fixed full-scale range value.
    Fixed(f64),
}

/// Measurement function of an electrometer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectrometerFunction {
    /// Low-current measurement.
    Current,
    /// High-impedance voltage measurement.
    Voltage,
    /// Resistance measurement.
    Resistance,
    /// Charge measurement.
    Charge,
}

/// One impedance reading: the primary and secondary components of the
/// selected measurement function (e.g. parallel capacitance and resistance).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LcrReading {
    /// Primary component (e.g. Cp in farad).
    pub primary: f64,
    /// Secondary component (e.g. Rp in ohm).
    pub secondary: f64,
}

/// Base contract every instrument driver satisfies.
///
/// An instrument owns exactly one communication resource handle for its
/// lifetime; the handle is released when the owning scope drops the driver.
/// Each method is one synchronous request/response exchange.
#[async_trait]
pub trait Instrument: Send + Sync {
    /// Instrument identification string (typically the `*IDN?` response).
    async fn identify(&mut self) -> AppResult<String>;

    /// Reset the instrument to its power-on defaults.
    async fn reset(&mut self) -> AppResult<()>;

    /// Clear the instrument's status and error queues.
    async fn clear(&mut self) -> AppResult<()>;

    /// Apply the driver's startup configuration.
    async fn configure(&mut self) -> AppResult<()>;

    /// Pop the next entry from the instrument's error queue, if any.
    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>>;
}

/// Capability: source-measure unit.
///
/// Setters reject out-of-contract values with a configuration error before
/// any command is sent; in particular a filter count above
/// [`FILTER_COUNT_MAX`].
#[async_trait]
pub trait SourceMeter: Instrument {
    /// Current output relay state.
    async fn output(&mut self) -> AppResult<OutputState>;

    /// Set the output relay state.
    async fn set_output(&mut self, state: OutputState) -> AppResult<()>;

    /// Currently selected source function.
    async fn source_function(&mut self) -> AppResult<SourceFunction>;

    /// Select the source function.
    async fn set_source_function(&mut self, function: SourceFunction) -> AppResult<()>;

    /// Set the source voltage level in volt.
    async fn set_source_voltage(&mut self, level: f64) -> AppResult<()>;

    /// Set the source current level in ampere.
    async fn set_source_current(&mut self, level: f64) -> AppResult<()>;

    /// Select the source voltage range.
    async fn set_source_voltage_range(&mut self, range: SourceRange) -> AppResult<()>;

    /// Select the source current range.
    async fn set_source_current_range(&mut self, range: SourceRange) -> AppResult<()>;

    /// Current sense wiring mode.
    async fn sense_mode(&mut self) -> AppResult<SenseMode>;

    /// Set the sense wiring mode.
    async fn set_sense_mode(&mut self, mode: SenseMode) -> AppResult<()>;

    /// Currently active terminal pair.
    async fn terminal(&mut self) -> AppResult<Terminal>;

    /// Select the active terminal pair.
    async fn set_terminal(&mut self, terminal: Terminal) -> AppResult<()>;

    /// Set the compliance voltage limit in volt.
    async fn set_compliance_voltage(&mut self, level: f64) -> AppResult<()>;

    /// Set the compliance current limit in ampere.
    async fn set_compliance_current(&mut self, level: f64) -> AppResult<()>;

    /// Whether the source is currently limited by its compliance setting.
    async fn compliance_tripped(&mut self) -> AppResult<bool>;

    /// Enable or disable the averaging filter.
    async fn set_filter_enabled(&mut self, enabled: bool) -> AppResult<()>;

    /// Set the averaging filter count (0..=[`FILTER_COUNT_MAX`]).
    async fn set_filter_count(&mut self, count: u32) -> AppResult<()>;

    /// Select the averaging filter algorithm.
    async fn set_filter_type(&mut self, filter: FilterType) -> AppResult<()>;

    /// Take one current reading in ampere.
    async fn read_current(&mut self) -> AppResult<f64>;

    /// Take one voltage reading in volt.
    async fn read_voltage(&mut self) -> AppResult<f64>;
}

/// Capability: impedance (LCR) meter.
#[async_trait]
pub trait LcrMeter: Instrument {
    /// Configured DC bias voltage level in volt.
    async fn bias_voltage(&mut self) -> AppResult<f64>;

    /// Set the DC bias voltage level in volt.
    async fn set_bias_voltage(&mut self, level: f64) -> AppResult<()>;

    /// Instrument-reported bias polarity current in ampere. Read-only.
    async fn bias_polarity_current(&mut self) -> AppResult<f64>;

    /// Instrument-reported bias polarity voltage in volt. Read-only.
    async fn bias_polarity_voltage(&mut self) -> AppResult<f64>;

    /// Whether the DC bias output is on.
    async fn bias_enabled(&mut self) -> AppResult<bool>;

    /// Switch the DC bias output on or off.
    async fn set_bias_enabled(&mut self, enabled: bool) -> AppResult<()>;

    /// Take one impedance reading.
    async fn acquire_reading(&mut self) -> AppResult<LcrReading>;
}

/// Capability: electrometer.
#[async_trait]
pub trait Electrometer: Instrument {
    /// Whether zero check is engaged.
    async fn zero_check(&mut self) -> AppResult<bool>;

    /// Engage or release zero check.
    async fn set_zero_check(&mut self, enabled: bool) -> AppResult<()>;

    /// Currently selected measurement function.
    async fn sense_function(&mut self) -> AppResult<ElectrometerFunction>;

    /// Select the measurement function.
    async fn set_sense_function(&mut self, function: ElectrometerFunction) -> AppResult<()>;

    /// Acquire a settled reading, polling at `interval` for up to `timeout`.
    async fn acquire_reading(&mut self, timeout: Duration, interval: Duration) -> AppResult<f64>;
}

/// Capability: switching matrix.
///
/// Channels are named routes that are closed and opened independently. The
/// matrix must return to the all-open state whenever no worker owns it.
#[async_trait]
pub trait SwitchingMatrix: Instrument {
    /// Names of the currently closed channels, in closing order.
    async fn closed_channels(&mut self) -> AppResult<Vec<String>>;

    /// Close the named channels in addition to any already closed.
    async fn close_channels(&mut self, channels: &[String]) -> AppResult<()>;

    /// Open every channel, returning the matrix to the all-open state.
    async fn open_all_channels(&mut self) -> AppResult<()>;
}

/// Capability: motorized probe table controller.
#[async_trait]
pub trait MotionTable: Instrument {
    /// Switch the controller into its host query mode.
    async fn enter_host_mode(&mut self) -> AppResult<()>;

    /// Per-axis calibration-done flags `(x, y, z)`.
    ///
    /// An axis reports [`CALDONE_COMPLETE`] once both its calibration and
    /// range-measure cycles have finished.
    async fn caldone(&mut self) -> AppResult<(u8, u8, u8)>;
}

/// Capability: environment box controller.
#[async_trait]
pub trait EnvironmentBox: Instrument {
    /// Bulk controller snapshot ("PC data") as reported by the box firmware.
    ///
    /// The payload is opaque to this crate and passed through to status
    /// consumers unchanged.
    async fn pc_data(&mut self) -> AppResult<serde_json::Value>;
}
