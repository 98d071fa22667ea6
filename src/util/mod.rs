//! Utility functions module
//!
//! Contains helper functions for units formatting and size parsing.

pub mod units;

pub use units::{
    calculate_ops_per_sec, calculate_throughput_mbps, format_bytes, format_rate,
    format_thousands, parse_bytes, round_up_to_multiple,
};
