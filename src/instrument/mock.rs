//! Mock instrument implementations.
//!
//! Simulated drivers for running the orchestration layer without hardware.
//! Every mock keeps per-instance state only; there is no shared emulator
//! state between sessions. Error injection knobs are set at construction so
//! tests can exercise the aggregator's failure isolation and the worker's
//! cleanup guarantees.

use crate::error::{AppResult, ProbeError};
use crate::instrument::capabilities::{
    Electrometer, ElectrometerFunction, EnvironmentBox, FilterType, Instrument, InstrumentError,
    LcrMeter, LcrReading, MotionTable, OutputState, SenseMode, SourceFunction, SourceMeter,
    SourceRange, SwitchingMatrix, Terminal, FILTER_COUNT_MAX,
};
use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MockSourceMeter
// =============================================================================

/// Simulated source-measure unit with plain in-memory state.
pub struct MockSourceMeter {
    model: String,
    output: OutputState,
    source_function: SourceFunction,
    source_voltage: f64,
    source_current: f64,
    voltage_range: SourceRange,
    current_range: SourceRange,
    sense_mode: SenseMode,
    terminal: Terminal,
    compliance_voltage: f64,
    compliance_current: f64,
    compliance_tripped: bool,
    filter_enabled: bool,
    filter_count: u32,
    filter_type: FilterType,
    reading_voltage: f64,
    reading_current: f64,
    error_queue: VecDeque<InstrumentError>,
    fail_identify: bool,
}

impl MockSourceMeter {
    /// Create a mock reporting `model` from its identification query.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            output: OutputState::Off,
            source_function: SourceFunction::Voltage,
            source_voltage: 0.0,
            source_current: 0.0,
            voltage_range: SourceRange::Auto,
            current_range: SourceRange::Auto,
            sense_mode: SenseMode::Local,
            terminal: Terminal::Front,
            compliance_voltage: 0.0,
            compliance_current: 0.0,
            compliance_tripped: false,
            filter_enabled: false,
            filter_count: 0,
            filter_type: FilterType::Repeat,
            reading_voltage: 0.0,
            reading_current: 0.0,
            error_queue: VecDeque::new(),
            fail_identify: false,
        }
    }

    /// Fix the values returned by `read_voltage` / `read_current`.
    pub fn with_readings(mut self, voltage: f64, current: f64) -> Self {
        self.reading_voltage = voltage;
        self.reading_current = current;
        self
    }

    /// Report the compliance limit as tripped.
    pub fn with_compliance_tripped(mut self) -> Self {
        self.compliance_tripped = true;
        self
    }

    /// Make the identification query fail with a resource error.
    pub fn failing_identify(mut self) -> Self {
        self.fail_identify = true;
        self
    }

    /// Queue an entry for `next_error` to pop.
    pub fn push_error(&mut self, code: i32, message: impl Into<String>) {
        self.error_queue.push_back(InstrumentError {
            code,
            message: message.into(),
        });
    }
}

#[async_trait]
impl Instrument for MockSourceMeter {
    async fn identify(&mut self) -> AppResult<String> {
        if self.fail_identify {
            return Err(ProbeError::Resource(format!(
                "{}: identification query failed",
                self.model
            )));
        }
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        *self = Self::new(self.model.clone());
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl SourceMeter for MockSourceMeter {
    async fn output(&mut self) -> AppResult<OutputState> {
        Ok(self.output)
    }

    async fn set_output(&mut self, state: OutputState) -> AppResult<()> {
        self.output = state;
        Ok(())
    }

    async fn source_function(&mut self) -> AppResult<SourceFunction> {
        Ok(self.source_function)
    }

    async fn set_source_function(&mut self, function: SourceFunction) -> AppResult<()> {
        self.source_function = function;
        Ok(())
    }

    async fn set_source_voltage(&mut self, level: f64) -> AppResult<()> {
        self.source_voltage = level;
        Ok(())
    }

    async fn set_source_current(&mut self, level: f64) -> AppResult<()> {
        self.source_current = level;
        Ok(())
    }

    async fn set_source_voltage_range(&mut self, range: SourceRange) -> AppResult<()> {
        self.voltage_range = range;
        Ok(())
    }

    async fn set_source_current_range(&mut self, range: SourceRange) -> AppResult<()> {
        self.current_range = range;
        Ok(())
    }

    async fn sense_mode(&mut self) -> AppResult<SenseMode> {
        Ok(self.sense_mode)
    }

    async fn set_sense_mode(&mut self, mode: SenseMode) -> AppResult<()> {
        self.sense_mode = mode;
        Ok(())
    }

    async fn terminal(&mut self) -> AppResult<Terminal> {
        Ok(self.terminal)
    }

    async fn set_terminal(&mut self, terminal: Terminal) -> AppResult<()> {
        self.terminal = terminal;
        Ok(())
    }

    async fn set_compliance_voltage(&mut self, level: f64) -> AppResult<()> {
        self.compliance_voltage = level;
        Ok(())
    }

    async fn set_compliance_current(&mut self, level: f64) -> AppResult<()> {
        self.compliance_current = level;
        Ok(())
    }

    async fn compliance_tripped(&mut self) -> AppResult<bool> {
        Ok(self.compliance_tripped)
    }

    async fn set_filter_enabled(&mut self, enabled: bool) -> AppResult<()> {
        self.filter_enabled = enabled;
        Ok(())
    }

    async fn set_filter_count(&mut self, count: u32) -> AppResult<()> {
        if count > FILTER_COUNT_MAX {
            return Err(ProbeError::Configuration(format!(
                "filter count {count} exceeds maximum of {FILTER_COUNT_MAX}"
            )));
        }
        self.filter_count = count;
        Ok(())
    }

    async fn set_filter_type(&mut self, filter: FilterType) -> AppResult<()> {
        self.filter_type = filter;
        Ok(())
    }

    async fn read_current(&mut self) -> AppResult<f64> {
        Ok(self.reading_current)
    }

    async fn read_voltage(&mut self) -> AppResult<f64> {
        Ok(self.reading_voltage)
    }
}

// =============================================================================
// MockLcrMeter
// =============================================================================

/// Call counters shared between a [`MockLcrMeter`] and its test.
///
/// The meter itself moves into the registry as a boxed trait object; the
/// probe stays with the test for inspection.
#[derive(Debug, Default)]
pub struct LcrProbe {
    acquisitions: AtomicUsize,
    resets: AtomicUsize,
    configures: AtomicUsize,
}

impl LcrProbe {
    /// Number of readings acquired so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of reset commands received.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Number of configure commands received.
    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }
}

/// Simulated impedance meter.
pub struct MockLcrMeter {
    model: String,
    bias_voltage: f64,
    bias_enabled: bool,
    polarity_current: f64,
    polarity_voltage: f64,
    reading: LcrReading,
    noise: f64,
    fail_after: Option<usize>,
    fail_configure: bool,
    error_queue: VecDeque<InstrumentError>,
    probe: Arc<LcrProbe>,
}

impl MockLcrMeter {
    /// Create a mock reporting `model`, producing `reading` on every acquisition.
    pub fn new(model: impl Into<String>, reading: LcrReading) -> Self {
        Self {
            model: model.into(),
            bias_voltage: 0.0,
            bias_enabled: false,
            polarity_current: 0.0,
            polarity_voltage: 0.0,
            reading,
            noise: 0.0,
            fail_after: None,
            fail_configure: false,
            error_queue: VecDeque::new(),
            probe: Arc::new(LcrProbe::default()),
        }
    }

    /// Add uniform jitter of the given amplitude to each component of the
    /// reading, to mimic a live instrument.
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }

    /// Fail every acquisition after `count` successful readings.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Make the configure command fail with a resource error.
    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /// Shared call counters for test inspection.
    pub fn probe(&self) -> Arc<LcrProbe> {
        Arc::clone(&self.probe)
    }

    fn jitter(&self) -> f64 {
        if self.noise > 0.0 {
            rand::thread_rng().gen_range(-self.noise..=self.noise)
        } else {
            0.0
        }
    }
}

#[async_trait]
impl Instrument for MockLcrMeter {
    async fn identify(&mut self) -> AppResult<String> {
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
        self.bias_voltage = 0.0;
        self.bias_enabled = false;
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        if self.fail_configure {
            return Err(ProbeError::Resource(format!(
                "{}: configuration rejected",
                self.model
            )));
        }
        self.probe.configures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl LcrMeter for MockLcrMeter {
    async fn bias_voltage(&mut self) -> AppResult<f64> {
        Ok(self.bias_voltage)
    }

    async fn set_bias_voltage(&mut self, level: f64) -> AppResult<()> {
        self.bias_voltage = level;
        Ok(())
    }

    async fn bias_polarity_current(&mut self) -> AppResult<f64> {
        Ok(self.polarity_current)
    }

    async fn bias_polarity_voltage(&mut self) -> AppResult<f64> {
        Ok(self.polarity_voltage)
    }

    async fn bias_enabled(&mut self) -> AppResult<bool> {
        Ok(self.bias_enabled)
    }

    async fn set_bias_enabled(&mut self, enabled: bool) -> AppResult<()> {
        self.bias_enabled = enabled;
        Ok(())
    }

    async fn acquire_reading(&mut self) -> AppResult<LcrReading> {
        let acquired = self.probe.acquisitions.load(Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if acquired >= limit {
                return Err(ProbeError::Resource(format!(
                    "{}: acquisition failed",
                    self.model
                )));
            }
        }
        self.probe.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(LcrReading {
            primary: self.reading.primary + self.jitter(),
            secondary: self.reading.secondary + self.jitter(),
        })
    }
}

// =============================================================================
// MockElectrometer
// =============================================================================

/// Simulated electrometer returning a fixed reading.
pub struct MockElectrometer {
    model: String,
    zero_check: bool,
    function: ElectrometerFunction,
    reading: f64,
    error_queue: VecDeque<InstrumentError>,
}

impl MockElectrometer {
    /// Create a mock reporting `model`, producing `reading` on acquisition.
    pub fn new(model: impl Into<String>, reading: f64) -> Self {
        Self {
            model: model.into(),
            zero_check: true,
            function: ElectrometerFunction::Current,
            reading,
            error_queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Instrument for MockElectrometer {
    async fn identify(&mut self) -> AppResult<String> {
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        self.zero_check = true;
        self.function = ElectrometerFunction::Current;
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl Electrometer for MockElectrometer {
    async fn zero_check(&mut self) -> AppResult<bool> {
        Ok(self.zero_check)
    }

    async fn set_zero_check(&mut self, enabled: bool) -> AppResult<()> {
        self.zero_check = enabled;
        Ok(())
    }

    async fn sense_function(&mut self) -> AppResult<ElectrometerFunction> {
        Ok(self.function)
    }

    async fn set_sense_function(&mut self, function: ElectrometerFunction) -> AppResult<()> {
        self.function = function;
        Ok(())
    }

    async fn acquire_reading(
        &mut self,
        _timeout: Duration,
        _interval: Duration,
    ) -> AppResult<f64> {
        // The mock settles instantly; the durations only shape real drivers.
        Ok(self.reading)
    }
}

// =============================================================================
// MockSwitchingMatrix
// =============================================================================

/// Shared view into a [`MockSwitchingMatrix`] for test inspection.
#[derive(Debug, Default)]
pub struct MatrixProbe {
    open_all_calls: AtomicUsize,
    closed: Mutex<Vec<String>>,
}

impl MatrixProbe {
    /// Number of times `open_all_channels` was invoked.
    pub fn open_all_calls(&self) -> usize {
        self.open_all_calls.load(Ordering::SeqCst)
    }

    /// Names of the currently closed channels.
    pub fn closed_channels(&self) -> Vec<String> {
        lock(&self.closed).clone()
    }
}

/// Simulated switching matrix tracking its closed-channel set.
pub struct MockSwitchingMatrix {
    model: String,
    fail_close: bool,
    error_queue: VecDeque<InstrumentError>,
    probe: Arc<MatrixProbe>,
}

impl MockSwitchingMatrix {
    /// Create a mock reporting `model` with all channels open.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fail_close: false,
            error_queue: VecDeque::new(),
            probe: Arc::new(MatrixProbe::default()),
        }
    }

    /// Make `close_channels` fail with a resource error.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Queue an error-queue entry, as left behind by a relay fault.
    pub fn with_queued_error(mut self, code: i32, message: impl Into<String>) -> Self {
        self.error_queue.push_back(InstrumentError {
            code,
            message: message.into(),
        });
        self
    }

    /// Pre-close channels, as if left over from earlier activity.
    pub fn with_closed(self, channels: &[&str]) -> Self {
        *lock(&self.probe.closed) = channels.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Shared channel/counter view for test inspection.
    pub fn probe(&self) -> Arc<MatrixProbe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Instrument for MockSwitchingMatrix {
    async fn identify(&mut self) -> AppResult<String> {
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        lock(&self.probe.closed).clear();
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl SwitchingMatrix for MockSwitchingMatrix {
    async fn closed_channels(&mut self) -> AppResult<Vec<String>> {
        Ok(lock(&self.probe.closed).clone())
    }

    async fn close_channels(&mut self, channels: &[String]) -> AppResult<()> {
        if self.fail_close {
            return Err(ProbeError::Resource(format!(
                "{}: relay drive failure",
                self.model
            )));
        }
        let mut closed = lock(&self.probe.closed);
        for channel in channels {
            if !closed.contains(channel) {
                closed.push(channel.clone());
            }
        }
        Ok(())
    }

    async fn open_all_channels(&mut self) -> AppResult<()> {
        self.probe.open_all_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.probe.closed).clear();
        Ok(())
    }
}

// =============================================================================
// MockMotionTable
// =============================================================================

/// Simulated probe table controller.
pub struct MockMotionTable {
    model: String,
    caldone: (u8, u8, u8),
    host_mode: bool,
    error_queue: VecDeque<InstrumentError>,
}

impl MockMotionTable {
    /// Create a mock reporting `model` with the given per-axis flags.
    pub fn new(model: impl Into<String>, caldone: (u8, u8, u8)) -> Self {
        Self {
            model: model.into(),
            caldone,
            host_mode: false,
            error_queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Instrument for MockMotionTable {
    async fn identify(&mut self) -> AppResult<String> {
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        self.host_mode = false;
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl MotionTable for MockMotionTable {
    async fn enter_host_mode(&mut self) -> AppResult<()> {
        self.host_mode = true;
        Ok(())
    }

    async fn caldone(&mut self) -> AppResult<(u8, u8, u8)> {
        if !self.host_mode {
            return Err(ProbeError::Logic(
                "caldone queried outside host mode".to_string(),
            ));
        }
        Ok(self.caldone)
    }
}

// =============================================================================
// MockEnvironmentBox
// =============================================================================

/// Simulated environment box controller.
pub struct MockEnvironmentBox {
    model: String,
    pc_data: serde_json::Value,
    error_queue: VecDeque<InstrumentError>,
}

impl MockEnvironmentBox {
    /// Create a mock reporting `model` with the given bulk payload.
    pub fn new(model: impl Into<String>, pc_data: serde_json::Value) -> Self {
        Self {
            model: model.into(),
            pc_data,
            error_queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Instrument for MockEnvironmentBox {
    async fn identify(&mut self) -> AppResult<String> {
        Ok(self.model.clone())
    }

    async fn reset(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn clear(&mut self) -> AppResult<()> {
        self.error_queue.clear();
        Ok(())
    }

    async fn configure(&mut self) -> AppResult<()> {
        Ok(())
    }

    async fn next_error(&mut self) -> AppResult<Option<InstrumentError>> {
        Ok(self.error_queue.pop_front())
    }
}

#[async_trait]
impl EnvironmentBox for MockEnvironmentBox {
    async fn pc_data(&mut self) -> AppResult<serde_json::Value> {
        Ok(self.pc_data.clone())
    }
}
