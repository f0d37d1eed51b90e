//! `growthrecorder` - Child growth measurement station
//!
//! This library collects a child's identity, reads weight and height from a
//! telemetry channel, stores each confirmed measurement locally, mirrors it
//! to a hosted table and renders it as a QR code.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod identity;
pub mod logging;
pub mod measurement;
pub mod qr;
pub mod readings;
pub mod sink;
pub mod storage;
pub mod store;
pub mod workflow;

pub use config::Config;
pub use error::{Error, Result};
pub use identity::{derive_age, IdentityForm, IdentityRecord};
pub use logging::init_logging;
pub use measurement::{MeasurementRecord, ReadingSample};
pub use qr::{QrEncoder, QrImage};
pub use readings::{ReadingProvider, TelemetryReadingProvider};
pub use sink::{RemoteSink, RestTableSink, SinkRow};
pub use storage::{Storage, StorageStats};
pub use store::LocalStore;
pub use workflow::{MeasurementWorkflow, WorkflowState};
