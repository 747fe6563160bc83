//! Schema & shape validation of defence traces.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Column set equals the defence schema.
//! 2. Exactly the classes `1..=nb_classes` are present.
//! 3. Every class has a repetition count strictly inside `mean ± deviation`.
//! 4. Every capture has strictly more than `min_rows_per_capture` rows.

use std::collections::BTreeMap;

use stroll_core::constants::DEFENCE_COLUMNS;
use stroll_core::context::EngineContext;
use stroll_core::error::DefenceError;
use stroll_core::types::{ClassId, TraceRow};

use crate::table::DefenceTable;

/// Row count of every capture, grouped by class then repetition.
pub(crate) fn rows_per_capture(rows: &[TraceRow]) -> BTreeMap<ClassId, BTreeMap<u64, usize>> {
    let mut index: BTreeMap<ClassId, BTreeMap<u64, usize>> = BTreeMap::new();
    for row in rows {
        *index
            .entry(row.class_id)
            .or_default()
            .entry(row.repetition_id)
            .or_default() += 1;
    }
    index
}

/// Validate a decoded defence trace. No side effects.
pub fn validate_defence(table: &DefenceTable, ctx: &EngineContext) -> Result<(), DefenceError> {
    if !table.has_defence_schema() {
        return Err(DefenceError::SchemaMismatch {
            expected: DEFENCE_COLUMNS.join(", "),
            found: table.columns.join(", "),
        });
    }

    let index = rows_per_capture(&table.rows);

    let distinct = index.len();
    let covered = index.keys().filter(|&&c| ctx.is_known_class(c)).count();
    if distinct != ctx.nb_classes || covered != ctx.nb_classes {
        return Err(DefenceError::IncompleteClassCoverage {
            expected: ctx.nb_classes,
            covered,
            distinct,
        });
    }

    let (min, max) = ctx.repetition_bounds();
    for (&class_id, repetitions) in &index {
        if !ctx.repetitions_in_bounds(repetitions.len()) {
            return Err(DefenceError::RepetitionCountOutOfBounds {
                class_id,
                count: repetitions.len(),
                min,
                max,
            });
        }
    }

    for (&class_id, repetitions) in &index {
        for (&repetition_id, &rows) in repetitions {
            if rows <= ctx.min_rows_per_capture {
                return Err(DefenceError::CaptureTooShort {
                    class_id,
                    repetition_id,
                    rows,
                    min: ctx.min_rows_per_capture,
                });
            }
        }
    }

    Ok(())
}
