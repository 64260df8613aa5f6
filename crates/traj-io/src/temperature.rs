use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use traj_core::error::{TrajError, TrajResult};

const LOG_NAME: &str = "temperature log";

/// Per-frame temperatures for an underlying trajectory, densely indexed
/// by underlying frame number.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemperatureLog {
    values: Vec<f64>,
}

impl TemperatureLog {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Builds the log from `(underlying_index, temperature)` pairs in any
    /// order. Every index in `0..entries.len()` must appear exactly once.
    pub fn from_entries(mut entries: Vec<(usize, f64)>) -> TrajResult<Self> {
        entries.sort_by_key(|&(index, _)| index);
        for (expected, &(index, _)) in entries.iter().enumerate() {
            if index != expected {
                let reason = if index < expected {
                    format!("underlying frame {index} listed more than once")
                } else {
                    format!("underlying frame {expected} missing")
                };
                return Err(TrajError::validation(LOG_NAME, reason));
            }
        }
        Ok(Self {
            values: entries.into_iter().map(|(_, t)| t).collect(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> TrajResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::parse_reader(BufReader::new(file))
    }

    /// Reads `index temperature` lines; blank lines and `#` comments are skipped.
    pub fn parse_reader<R: BufRead>(reader: R) -> TrajResult<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let mut fields = content.split_whitespace();
            let (Some(index), Some(temp), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(TrajError::Parse(format!(
                    "temperature log line {}: expected 'index temperature'",
                    line_no + 1
                )));
            };
            let index: usize = index.parse().map_err(|_| {
                TrajError::Parse(format!(
                    "temperature log line {}: invalid frame index '{index}'",
                    line_no + 1
                ))
            })?;
            let temp: f64 = temp.parse().map_err(|_| {
                TrajError::Parse(format!(
                    "temperature log line {}: invalid temperature '{temp}'",
                    line_no + 1
                ))
            })?;
            entries.push((index, temp));
        }
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}
