//! Units formatting and conversion utilities
//!
//! Human-readable sizes, throughput and operation-rate figures for the
//! benchmark reports.

use std::time::Duration;

/// Format bytes into human-readable size with binary units
///
/// # Examples
/// ```
/// use hwbench::util::units::format_bytes;
///
/// assert_eq!(format_bytes(1024), "1.0 KiB");
/// assert_eq!(format_bytes(4 * 1048576), "4.0 MiB");
/// assert_eq!(format_bytes(2 * 1073741824), "2.0 GiB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Parse human-readable size string into bytes
///
/// Supports units: B, KB, MB, GB, TB, KiB, MiB, GiB, TiB. Bare numbers are bytes.
///
/// # Examples
/// ```
/// use hwbench::util::units::parse_bytes;
///
/// assert_eq!(parse_bytes("4 MiB").unwrap(), 4194304);
/// assert_eq!(parse_bytes("2GiB").unwrap(), 2147483648);
/// assert_eq!(parse_bytes("2 GB").unwrap(), 2000000000);
/// ```
pub fn parse_bytes(input: &str) -> Result<u64, String> {
    let input = input.trim();

    let (number_part, unit_part) = if let Some(space_pos) = input.rfind(' ') {
        (input[..space_pos].trim(), &input[space_pos + 1..])
    } else {
        let split_pos = input
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(input.len());
        (&input[..split_pos], &input[split_pos..])
    };

    let number: f64 = number_part
        .parse()
        .map_err(|_| format!("Invalid number: {}", number_part))?;

    if !number.is_finite() || number < 0.0 {
        return Err("Size must be a non-negative number".to_string());
    }

    let multiplier = match unit_part.to_uppercase().as_str() {
        "" | "B" => 1u64,
        "KB" => 1_000u64,
        "MB" => 1_000_000u64,
        "GB" => 1_000_000_000u64,
        "TB" => 1_000_000_000_000u64,
        "KIB" => 1_024u64,
        "MIB" => 1_048_576u64,
        "GIB" => 1_073_741_824u64,
        "TIB" => 1_099_511_627_776u64,
        _ => return Err(format!("Unknown unit: {}", unit_part)),
    };

    Ok((number * multiplier as f64) as u64)
}

/// Calculate throughput in MB/s (MiB based) from bytes and duration
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use hwbench::util::units::calculate_throughput_mbps;
///
/// let throughput = calculate_throughput_mbps(1048576, Duration::from_secs(1));
/// assert!((throughput - 1.0).abs() < 0.01);
/// ```
pub fn calculate_throughput_mbps(bytes: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    let megabytes = bytes as f64 / 1_048_576.0;
    megabytes / duration.as_secs_f64()
}

/// Calculate operations per second
pub fn calculate_ops_per_sec(operations: u64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }

    operations as f64 / duration.as_secs_f64()
}

/// Round `value` up to the next multiple of `step`
///
/// A zero step leaves the value unchanged.
pub fn round_up_to_multiple(value: u64, step: u64) -> u64 {
    if step == 0 {
        return value;
    }
    value.div_ceil(step).saturating_mul(step)
}

/// Format an integer with comma thousands separators
///
/// # Examples
/// ```
/// use hwbench::util::units::format_thousands;
///
/// assert_eq!(format_thousands(1234567), "1,234,567");
/// assert_eq!(format_thousands(999), "999");
/// ```
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Format a rate rounded to zero decimal places with thousands separators
pub fn format_rate(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round();
    if rounded < 0.0 {
        return format!("-{}", format_thousands((-rounded) as u64));
    }
    format_thousands(rounded as u64)
}
