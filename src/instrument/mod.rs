//! Instrument capability contracts and mock drivers.
//!
//! Concrete drivers (SCPI/TSP command encoding, VISA or socket transports)
//! live outside this crate; everything here is the typed surface they
//! implement and the simulated drivers used for tests.

pub mod capabilities;
pub mod mock;

pub use capabilities::{
    Electrometer, ElectrometerFunction, EnvironmentBox, FilterType, Instrument, InstrumentError,
    LcrMeter, LcrReading, MotionTable, OutputState, SenseMode, SourceFunction, SourceMeter,
    SourceRange, SwitchingMatrix, Terminal, CALDONE_COMPLETE, FILTER_COUNT_MAX,
};
