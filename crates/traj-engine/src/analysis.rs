use std::collections::BTreeMap;

use tracing::debug;

use traj_core::error::{TrajError, TrajResult};

use crate::action::{Analysis, Dataset};
use crate::registry::{AnalysisRegistry, RegistryBuilder};

const RUNNING_AVERAGE_WINDOW: usize = 5;

/// Looks up `key` and applies a fresh instance to `input`.
pub fn run_analysis(registry: &AnalysisRegistry, key: &str, input: &Dataset) -> TrajResult<Dataset> {
    let analysis = registry.get(key)?;
    debug!(analysis = key, input = input.kind(), len = input.len(), "applying analysis");
    analysis.apply(input)
}

fn series<'a>(name: &str, input: &'a Dataset) -> TrajResult<&'a [f64]> {
    let values = input.as_series().ok_or_else(|| {
        TrajError::Shape(format!("{name} expects a series, got a {}", input.kind()))
    })?;
    if values.is_empty() {
        return Err(TrajError::Shape(format!("{name} needs at least one value")));
    }
    Ok(values)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean, population standard deviation, min and max of a series.
#[derive(Debug, Default)]
pub struct Stat;

impl Analysis for Stat {
    fn name(&self) -> &'static str {
        "stat"
    }

    fn apply(&self, input: &Dataset) -> TrajResult<Dataset> {
        let values = series(self.name(), input)?;
        let mean = mean(values);
        let variance =
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let summary = BTreeMap::from([
            ("mean".to_string(), mean),
            ("stddev".to_string(), variance.sqrt()),
            ("min".to_string(), min),
            ("max".to_string(), max),
        ]);
        Ok(Dataset::Summary(summary))
    }
}

/// Trailing running average; the first values average over what is available.
#[derive(Debug)]
pub struct RunningAverage {
    window: usize,
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self {
            window: RUNNING_AVERAGE_WINDOW,
        }
    }
}

impl RunningAverage {
    pub fn with_window(window: usize) -> TrajResult<Self> {
        if window == 0 {
            return Err(TrajError::validation("runavg", "window must be >= 1"));
        }
        Ok(Self { window })
    }
}

impl Analysis for RunningAverage {
    fn name(&self) -> &'static str {
        "runavg"
    }

    fn apply(&self, input: &Dataset) -> TrajResult<Dataset> {
        let values = series(self.name(), input)?;
        let averaged = (0..values.len())
            .map(|i| mean(&values[(i + 1).saturating_sub(self.window)..=i]))
            .collect();
        Ok(Dataset::Series(averaged))
    }
}

/// Normalized autocorrelation for every lag, with lag 0 equal to one.
#[derive(Debug, Default)]
pub struct Autocorr;

impl Analysis for Autocorr {
    fn name(&self) -> &'static str {
        "autocorr"
    }

    fn apply(&self, input: &Dataset) -> TrajResult<Dataset> {
        let values = series(self.name(), input)?;
        let mean = mean(values);
        let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let c0: f64 = centered.iter().map(|v| v * v).sum();
        let n = centered.len();
        let out = (0..n)
            .map(|lag| {
                if c0 == 0.0 {
                    return if lag == 0 { 1.0 } else { 0.0 };
                }
                let ck: f64 = centered[..n - lag]
                    .iter()
                    .zip(&centered[lag..])
                    .map(|(a, b)| a * b)
                    .sum();
                ck / c0
            })
            .collect();
        Ok(Dataset::Series(out))
    }
}

fn boxed<A: Analysis + Default + 'static>() -> TrajResult<Box<dyn Analysis>> {
    Ok(Box::new(A::default()))
}

pub(crate) fn register_builtins(builder: &mut RegistryBuilder<dyn Analysis>) -> TrajResult<()> {
    builder.register("stat", boxed::<Stat>)?;
    builder.register("runavg", boxed::<RunningAverage>)?;
    builder.register("autocorr", boxed::<Autocorr>)?;
    Ok(())
}
