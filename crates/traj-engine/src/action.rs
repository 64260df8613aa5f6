use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use traj_core::error::TrajResult;
use traj_core::frame::FrameView;
use traj_core::topology::Topology;

/// What an action needs from the source and topology before it can run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub needs_box: bool,
    pub needs_topology: bool,
    pub needs_temperature: bool,
    pub expected_atoms: Option<usize>,
}

impl Capabilities {
    pub const NONE: Self = Self::new(false, false, false);

    pub const fn new(needs_box: bool, needs_topology: bool, needs_temperature: bool) -> Self {
        Self {
            needs_box,
            needs_topology,
            needs_temperature,
            expected_atoms: None,
        }
    }

    pub const fn with_expected_atoms(self, n_atoms: usize) -> Self {
        Self {
            expected_atoms: Some(n_atoms),
            ..self
        }
    }
}

/// Result of finalizing an action or applying an analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    Series(Vec<f64>),
    Matrix {
        data: Vec<f64>,
        rows: usize,
        cols: usize,
    },
    Vectors(Vec<[f64; 3]>),
    Summary(BTreeMap<String, f64>),
}

impl Dataset {
    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Series(_) => "series",
            Dataset::Matrix { .. } => "matrix",
            Dataset::Vectors(_) => "vectors",
            Dataset::Summary(_) => "summary",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Series(values) => values.len(),
            Dataset::Matrix { rows, .. } => *rows,
            Dataset::Vectors(values) => values.len(),
            Dataset::Summary(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Dataset::Series(values) => Some(values),
            _ => None,
        }
    }
}

/// Stateful per-frame computation driven by `ActionDriver`.
///
/// Frames arrive in strictly increasing logical order. `finalize` may be
/// called after any number of frames, including zero.
pub trait Action: Send {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn init(&mut self, topology: Option<&Topology>) -> TrajResult<()> {
        let _ = topology;
        Ok(())
    }

    fn process(&mut self, index: usize, frame: FrameView<'_>) -> TrajResult<()>;

    fn finalize(&mut self) -> TrajResult<Dataset>;
}

/// Post-processing step over a dataset produced by a run.
pub trait Analysis: Send {
    fn name(&self) -> &'static str;

    fn apply(&self, input: &Dataset) -> TrajResult<Dataset>;
}
