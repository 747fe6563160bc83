//! CSV decoding of uploaded defence traces and attack submissions.
//!
//! The header row is always kept so the validators can report a schema
//! mismatch. Data rows are only decoded when the header matches the expected
//! column set; otherwise the table carries no rows.

use std::collections::BTreeSet;
use std::io;

use stroll_core::constants::{CAPTURE_ID_COLUMN, DEFENCE_COLUMNS, TEAM_ID_COLUMN};
use stroll_core::context::EngineContext;
use stroll_core::error::TableError;
use stroll_core::types::{AttackRow, ClassId, TraceRow};

/// Decoded defence upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DefenceTable {
    pub columns: Vec<String>,
    pub rows: Vec<TraceRow>,
}

impl DefenceTable {
    /// Decode a CSV defence trace. Columns are matched by name, in any order.
    pub fn read_csv<R: io::Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let columns = header_names(&mut rdr)?;
        if !same_columns(&columns, &DEFENCE_COLUMNS) {
            return Ok(Self {
                columns,
                rows: Vec::new(),
            });
        }

        let mut rows = Vec::new();
        for (i, result) in rdr.deserialize::<TraceRow>().enumerate() {
            rows.push(result.map_err(|e| malformed(i, e))?);
        }
        Ok(Self { columns, rows })
    }

    /// Table with the defence schema and the given rows.
    pub fn from_rows(rows: Vec<TraceRow>) -> Self {
        Self {
            columns: DEFENCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn has_defence_schema(&self) -> bool {
        same_columns(&self.columns, &DEFENCE_COLUMNS)
    }
}

/// Decoded attack upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackTable {
    pub columns: Vec<String>,
    pub rows: Vec<AttackRow>,
}

impl AttackTable {
    /// Decode a CSV attack submission against the schema implied by `ctx`.
    pub fn read_csv<R: io::Read>(reader: R, ctx: &EngineContext) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let columns = header_names(&mut rdr)?;
        if !same_columns(&columns, &ctx.attack_columns()) {
            return Ok(Self {
                columns,
                rows: Vec::new(),
            });
        }

        let position = |name: &str| columns.iter().position(|c| c == name);
        // Schema already checked: every lookup below succeeds.
        let (Some(team_idx), Some(capture_idx)) = (position(TEAM_ID_COLUMN), position(CAPTURE_ID_COLUMN))
        else {
            return Err(TableError::Unreadable("missing identifier columns".into()));
        };
        let probability_idx: Vec<usize> = (1..=ctx.nb_classes as ClassId)
            .filter_map(|k| position(&EngineContext::probability_column(k)))
            .collect();

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| malformed(i, e))?;
            let team_id = parse_field(&record, team_idx, i)?;
            let capture_id = parse_field(&record, capture_idx, i)?;
            let probabilities = probability_idx
                .iter()
                .map(|&idx| parse_field::<f64>(&record, idx, i))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(AttackRow {
                team_id,
                capture_id,
                probabilities,
            });
        }
        Ok(Self { columns, rows })
    }

    /// Table with the attack schema of `ctx` and the given rows.
    pub fn from_rows(ctx: &EngineContext, rows: Vec<AttackRow>) -> Self {
        Self {
            columns: ctx.attack_columns(),
            rows,
        }
    }

    pub fn has_attack_schema(&self, ctx: &EngineContext) -> bool {
        same_columns(&self.columns, &ctx.attack_columns())
    }
}

/// Order-independent column comparison. Duplicated names never match.
pub fn same_columns<S: AsRef<str>>(found: &[String], expected: &[S]) -> bool {
    let found_set: BTreeSet<&str> = found.iter().map(String::as_str).collect();
    let expected_set: BTreeSet<&str> = expected.iter().map(AsRef::as_ref).collect();
    found.len() == expected.len() && found_set == expected_set
}

fn header_names<R: io::Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>, TableError> {
    let headers = rdr
        .headers()
        .map_err(|e| TableError::Unreadable(e.to_string()))?;
    Ok(headers.iter().map(str::to_string).collect())
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    row: usize,
) -> Result<T, TableError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(idx).ok_or_else(|| TableError::Malformed {
        row: row + 1,
        message: format!("missing field {}", idx + 1),
    })?;
    raw.parse().map_err(|e: T::Err| TableError::Malformed {
        row: row + 1,
        message: format!("invalid value {raw:?}: {e}"),
    })
}

fn malformed(row: usize, e: csv::Error) -> TableError {
    TableError::Malformed {
        row: row + 1,
        message: e.to_string(),
    }
}
