//! Whitespace-separated ASCII tables with `#` comments.
//!
//! A table must declare the unit of its first column in a header line
//! `# wavelength_unit = <unit>`; values are converted to micrometers on load.

use crate::quantity::{PhysicalType, Unit};

const UNIT_KEY: &str = "wavelength_unit";

/// Parsed numeric table with its first column in micrometers.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiTable {
    pub wavelength_unit: Unit,
    pub rows: Vec<Vec<f64>>,
}

impl AsciiTable {
    pub fn parse(text: &str, ncols: usize) -> Result<Self, String> {
        let mut unit = None;
        let mut rows = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some((key, value)) = comment.split_once('=') {
                    if key.trim() == UNIT_KEY {
                        unit = Some(value.trim().parse::<Unit>().map_err(|e| e.to_string())?);
                    }
                }
                continue;
            }

            let row = line
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>()
                        .map_err(|_| format!("line {}: invalid number '{tok}'", lineno + 1))
                })
                .collect::<Result<Vec<f64>, String>>()?;
            if row.len() != ncols {
                return Err(format!(
                    "line {}: expected {ncols} columns, found {}",
                    lineno + 1,
                    row.len()
                ));
            }
            rows.push(row);
        }

        let wavelength_unit = unit.ok_or_else(|| format!("missing '# {UNIT_KEY} = <unit>' header"))?;
        if wavelength_unit.physical_type() != PhysicalType::Length {
            return Err(format!("wavelength unit must be a length, got {wavelength_unit}"));
        }
        let factor = wavelength_unit
            .conversion_factor(Unit::Micrometer)
            .map_err(|e| e.to_string())?;
        for row in rows.iter_mut() {
            row[0] *= factor;
        }

        Ok(Self { wavelength_unit, rows })
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }
}
