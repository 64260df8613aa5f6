use serde::{Deserialize, Serialize};
use tracing::info;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::FrameView;

use crate::stream::LazyFileStream;
use crate::temperature::TemperatureLog;
use crate::{check_index, FrameDecoder, FrameSource};

/// Which replica temperature to keep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemdOptions {
    pub target: f64,
    #[serde(default)]
    pub tolerance: f64,
}

impl RemdOptions {
    pub fn new(target: f64, tolerance: f64) -> Self {
        Self { target, tolerance }
    }

    pub fn validate(&self) -> TrajResult<()> {
        if !self.target.is_finite() {
            return Err(TrajError::validation(
                "remd options",
                format!("target temperature {} is not finite", self.target),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(TrajError::validation(
                "remd options",
                format!("tolerance {} must be finite and >= 0", self.tolerance),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, temperature: f64) -> bool {
        (temperature - self.target).abs() <= self.tolerance
    }
}

/// Replica-exchange view of a lazy stream: only frames whose temperature
/// matches the target are visible, renumbered from zero.
///
/// Only the logical-to-underlying index map is stored; frames are decoded
/// on demand through the wrapped stream.
#[derive(Debug)]
pub struct TemperatureFilteredStream<D> {
    inner: LazyFileStream<D>,
    options: RemdOptions,
    mapping: Vec<usize>,
}

impl<D: FrameDecoder> TemperatureFilteredStream<D> {
    /// Filters on the temperatures the stream already carries.
    pub fn new(inner: LazyFileStream<D>, options: RemdOptions) -> TrajResult<Self> {
        options.validate()?;
        let Some(temps) = inner.temperatures() else {
            return Err(TrajError::Capability(
                "temperature filtering needs a stream with temperatures".into(),
            ));
        };
        let mapping: Vec<usize> = temps
            .iter()
            .enumerate()
            .filter(|&(_, &t)| options.matches(t))
            .map(|(i, _)| i)
            .collect();
        info!(
            target_temperature = options.target,
            tolerance = options.tolerance,
            matched = mapping.len(),
            total = temps.len(),
            "built replica temperature index"
        );
        Ok(Self {
            inner,
            options,
            mapping,
        })
    }

    /// Filters on an auxiliary log; its length must equal the stream's frame count.
    pub fn with_log(
        inner: LazyFileStream<D>,
        log: TemperatureLog,
        options: RemdOptions,
    ) -> TrajResult<Self> {
        Self::new(inner.with_temperature_log(log)?, options)
    }

    pub fn options(&self) -> RemdOptions {
        self.options
    }

    /// Underlying frame number behind logical frame `index`.
    pub fn underlying_index(&self, index: usize) -> TrajResult<usize> {
        check_index(index, self.mapping.len())?;
        Ok(self.mapping[index])
    }

    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn inner(&self) -> &LazyFileStream<D> {
        &self.inner
    }
}

impl<D: FrameDecoder> FrameSource for TemperatureFilteredStream<D> {
    fn frame_count(&self) -> usize {
        self.mapping.len()
    }

    fn atom_count(&self) -> usize {
        self.inner.atom_count()
    }

    fn has_box(&self) -> bool {
        self.inner.has_box()
    }

    fn has_temperatures(&self) -> bool {
        true
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>> {
        let underlying = self.underlying_index(index)?;
        self.inner.frame_at(underlying)
    }

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        self.inner.temperature_at(self.underlying_index(index)?)
    }
}
