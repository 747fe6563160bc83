//! Utility scoring of defence traces.
//!
//! Each capture contributes three quantities: its inbound volume (sum of the
//! negative byte counts, kept negative), its outbound volume (sum of the
//! non-negative byte counts), and its duration (largest timestamp). The
//! record holds the max, mean, and median of each over all captures.

use std::collections::BTreeMap;

use stroll_core::types::{CaptureKey, TraceRow, UtilityRecord};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct CaptureCost {
    inbound: i64,
    outbound: i64,
    duration: f64,
}

/// Compute the utility record of an already validated trace.
///
/// An empty trace yields an all-zero record.
pub fn evaluate_utility(rows: &[TraceRow]) -> UtilityRecord {
    let mut captures: BTreeMap<CaptureKey, CaptureCost> = BTreeMap::new();
    for row in rows {
        let cost = captures.entry(row.capture()).or_insert(CaptureCost {
            inbound: 0,
            outbound: 0,
            duration: f64::NEG_INFINITY,
        });
        if row.is_inbound() {
            cost.inbound += row.signed_byte_count;
        } else {
            cost.outbound += row.signed_byte_count;
        }
        cost.duration = cost.duration.max(row.timestamp);
    }

    let inbound: Vec<i64> = captures.values().map(|c| c.inbound).collect();
    let outbound: Vec<i64> = captures.values().map(|c| c.outbound).collect();
    let durations: Vec<f64> = captures.values().map(|c| c.duration).collect();

    let record = UtilityRecord {
        max_inbound_volume: inbound.iter().copied().max().unwrap_or(0),
        mean_inbound_volume: mean(inbound.iter().map(|&v| v as f64)),
        median_inbound_volume: median(inbound.iter().map(|&v| v as f64).collect()),
        max_outbound_volume: outbound.iter().copied().max().unwrap_or(0),
        mean_outbound_volume: mean(outbound.iter().map(|&v| v as f64)),
        median_outbound_volume: median(outbound.iter().map(|&v| v as f64).collect()),
        max_duration: durations.iter().copied().reduce(f64::max).unwrap_or(0.0),
        mean_duration: mean(durations.iter().copied()),
        median_duration: median(durations),
    };
    debug!(captures = captures.len(), score = record.aggregated_score(), "utility evaluated");
    record
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Median; the mean of the two middle values for even lengths.
fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
