//! Tab-delimited numeric tables, four decimal places per value.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use ndarray::prelude::*;

use crate::utils::QuantError;

/// Writes one value per line.
pub fn write_table_1d<P : AsRef<Path>>(path : P, values : &ArrayView1<f64>) -> Result<(), QuantError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values.iter() {
        writeln!(writer, "{:.4}", value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per line, columns separated by tabs.
pub fn write_table_2d<P : AsRef<Path>>(path : P, values : &ArrayView2<f64>) -> Result<(), QuantError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in values.axis_iter(Axis(0)) {
        writeln!(writer, "{}", row.iter().map(|v| format!("{:.4}", v)).join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a numeric table separated by tabs, spaces or commas. Blank
/// lines and lines starting with `#` are skipped; every remaining row
/// must have the same number of columns.
///
/// ## Example
///
/// ```rust, ignore
/// let roi = read_table("roi.txt")?;
/// assert_eq!(roi.ncols(), 2);
/// ```
pub fn read_table<P : AsRef<Path>>(path : P) -> Result<Array2<f64>, QuantError> {
    let reader = BufReader::new(File::open(path)?);

    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = trimmed
            .split(|c : char| c.is_whitespace() || c == ',')
            .filter(|field| !field.is_empty())
            .map(|field| field.parse::<f64>().map_err(|err| QuantError::FormatError(
                format!("line {}: could not parse {:?}: {}", line_number + 1, field, err)
            )))
            .collect::<Result<Vec<f64>, QuantError>>()?;

        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(QuantError::FormatError(format!(
                    "line {}: expected {} columns, found {}", line_number + 1, n, row.len()
                )));
            },
            _ => {},
        }
        values.extend(row);
        nrows += 1;
    }

    let ncols = ncols.ok_or_else(|| QuantError::FormatError("table is empty".to_string()))?;
    Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|err| QuantError::FormatError(err.to_string()))
}
