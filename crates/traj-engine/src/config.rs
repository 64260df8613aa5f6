use std::iter::StepBy;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use traj_core::error::{TrajError, TrajResult};

const CONFIG_NAME: &str = "driver config";

/// What a failed run leaves behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialResultPolicy {
    /// Accumulated action state is dropped with the run.
    #[default]
    Discard,
    /// Actions are finalized over the frames seen so far and kept for `take_partial`.
    Keep,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub partial_results: PartialResultPolicy,
    #[serde(default)]
    pub log_every: Option<usize>,
    #[serde(default = "default_stride")]
    pub frame_stride: usize,
    /// Half-open `[start, end)` window of logical frames.
    #[serde(default)]
    pub frame_range: Option<(usize, usize)>,
}

fn default_stride() -> usize {
    1
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            partial_results: PartialResultPolicy::Discard,
            log_every: None,
            frame_stride: default_stride(),
            frame_range: None,
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(text: &str) -> TrajResult<Self> {
        let config: DriverConfig = serde_json::from_str(text)
            .map_err(|err| TrajError::Parse(format!("{CONFIG_NAME}: {err}")))?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        if self.log_every == Some(0) {
            self.log_every = None;
        }
        self
    }

    pub fn keep_partial(mut self) -> Self {
        self.partial_results = PartialResultPolicy::Keep;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.frame_stride = stride;
        self
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.frame_range = Some((start, end));
        self
    }

    /// Checks the config against a source of `n_frames` frames.
    pub fn validate(&self, n_frames: usize) -> TrajResult<()> {
        if self.frame_stride == 0 {
            return Err(TrajError::validation(CONFIG_NAME, "frame_stride must be >= 1"));
        }
        if let Some((start, end)) = self.frame_range {
            if start > end {
                return Err(TrajError::validation(
                    CONFIG_NAME,
                    format!("frame_range start {start} is after end {end}"),
                ));
            }
            if end > n_frames {
                return Err(TrajError::index("frame", end - 1, n_frames));
            }
        }
        Ok(())
    }

    /// Logical frame indices a run visits, in increasing order.
    pub fn frame_indices(&self, n_frames: usize) -> StepBy<Range<usize>> {
        let (start, end) = self.frame_range.unwrap_or((0, n_frames));
        (start..end.min(n_frames)).step_by(self.frame_stride.max(1))
    }
}
