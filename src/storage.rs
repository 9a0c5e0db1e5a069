use crate::error::{Error, Result};
use crate::models::{Observation, QueryDescriptor, SERIES_FIELDS, SeriesMeta, ShapedTable};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Export switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Prefix text cells starting with `=`, `+`, `-` or `@` with `'` so spreadsheet
    /// applications do not evaluate them. Numeric cells are left alone.
    pub sanitize_formulas: bool,
}

fn defuse(cell: String) -> String {
    if cell.starts_with(['=', '+', '-', '@']) {
        format!("'{}", cell)
    } else {
        cell
    }
}

/// Write the table as CSV: header row in fixed field order, then one row per record.
pub fn write_csv<W: Write>(table: &ShapedTable, writer: W, opts: ExportOptions) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(table.fields())?;
    let numeric_col = match table {
        ShapedTable::Observations(_) => Some(2),
        ShapedTable::Series(_) => None,
    };
    for row in table.rows() {
        let row: Vec<String> = row
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                if opts.sanitize_formulas && Some(i) != numeric_col {
                    defuse(cell)
                } else {
                    cell
                }
            })
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save as CSV with header.
pub fn save_csv<P: AsRef<Path>>(table: &ShapedTable, path: P) -> Result<()> {
    save_csv_with(table, path, ExportOptions::default())
}

pub fn save_csv_with<P: AsRef<Path>>(table: &ShapedTable, path: P, opts: ExportOptions) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path)?;
    write_csv(table, f, opts)?;
    info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Save as a pretty JSON array of row objects.
pub fn save_json<P: AsRef<Path>>(table: &ShapedTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path)?;
    let s = match table {
        ShapedTable::Series(rows) => serde_json::to_string_pretty(rows)?,
        ShapedTable::Observations(rows) => serde_json::to_string_pretty(rows)?,
    };
    f.write_all(s.as_bytes())?;
    info!("wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
}

fn opt_cell(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Parse a CSV written by [`write_csv`] back into a table; the header decides the row kind.
pub fn read_csv<R: Read>(reader: R) -> Result<ShapedTable> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let headers: Vec<&str> = headers.iter().map(String::as_str).collect();

    if headers == SERIES_FIELDS {
        let mut rows = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            let cell = |i: usize| rec.get(i).unwrap_or_default();
            rows.push(SeriesMeta {
                id: cell(0).to_string(),
                title: cell(1).to_string(),
                survey: opt_cell(cell(2)),
                survey_name: opt_cell(cell(3)),
                seasonality: opt_cell(cell(4)),
            });
        }
        return Ok(ShapedTable::Series(rows));
    }

    if headers == ["id", "period", "value"] || headers == ["id", "period", "value", "footnote"] {
        let mut rows = Vec::new();
        for rec in rdr.records() {
            let rec = rec?;
            let cell = |i: usize| rec.get(i).unwrap_or_default();
            let value = match cell(2) {
                "" => None,
                v => Some(
                    v.parse::<f64>()
                        .ok()
                        .filter(|x| x.is_finite())
                        .ok_or_else(|| invalid(format!("non-numeric value {:?}", v)))?,
                ),
            };
            rows.push(Observation {
                id: cell(0).to_string(),
                period: cell(1).to_string(),
                value,
                footnote: opt_cell(cell(3)),
            });
        }
        return Ok(ShapedTable::Observations(rows));
    }

    Err(invalid(format!("unrecognized header: {}", headers.join(","))))
}

/// `"{YYYY-MM-DD} {label}.csv"`, where the label is the keyword or the first series id.
/// Characters unsafe in file names are replaced by `_`.
pub fn default_file_name(query: &QueryDescriptor, date: NaiveDate) -> String {
    default_file_name_as(query, date, "csv")
}

/// Same as [`default_file_name`] with another extension, e.g. `"json"`.
pub fn default_file_name_as(query: &QueryDescriptor, date: NaiveDate, extension: &str) -> String {
    let label = match query {
        QueryDescriptor::Search { keyword } => keyword.as_str(),
        _ => query.series().first().map(|s| s.as_str()).unwrap_or_default(),
    };
    let label: String = label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{} {}.{}", date.format("%Y-%m-%d"), label.trim(), extension)
}
