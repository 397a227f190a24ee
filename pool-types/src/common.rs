// SPDX-License-Identifier: GPL-3.0-only

//! Formatting helpers shared by the views

use num_format::{Locale, ToFormattedString};

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Size in the largest binary unit that keeps the value at or above one,
/// e.g. "1.50 GB". With `exact` the byte count is appended.
pub fn bytes_to_pretty(bytes: u64, exact: bool) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    let pretty = format!("{value:.2} {}", UNITS[unit]);
    if exact {
        format!("{pretty} ({} bytes)", bytes.to_formatted_string(&Locale::en))
    } else {
        pretty
    }
}
