// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-table output helpers.

/// Print rows as aligned columns.
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.len());
            }
        }
    }
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{h:<width$}", width = widths[i]))
        .collect();
    println!("{}", header_line.join("  "));
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        println!("{}", line.join("  "));
    }
}

/// Milliseconds-epoch rendered as a short relative age.
pub fn age(now_ms: u64, at_ms: u64) -> String {
    let delta_s = now_ms.saturating_sub(at_ms) / 1000;
    match delta_s {
        0..=59 => format!("{delta_s}s"),
        60..=3599 => format!("{}m", delta_s / 60),
        3600..=86399 => format!("{}h", delta_s / 3600),
        _ => format!("{}d", delta_s / 86400),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
