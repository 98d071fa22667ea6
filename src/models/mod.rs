//! Data models module
//!
//! Contains the measurement records produced by both benchmarks.

pub mod result;

pub use result::{
    ComputeRun, Direction, StorageRun, SystemInfo, TransferSample, WorkerResult,
};
