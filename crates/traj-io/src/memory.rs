use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::FrameView;
use traj_core::trajectory::Trajectory;

use crate::{check_index, FrameSource};

/// Frame source over an in-memory `Trajectory`. Lookups are O(1) views with no I/O.
#[derive(Debug, Clone)]
pub struct InMemorySequence {
    traj: Trajectory,
}

impl InMemorySequence {
    pub fn new(traj: Trajectory) -> Self {
        Self { traj }
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.traj
    }

    pub fn into_inner(self) -> Trajectory {
        self.traj
    }
}

impl From<Trajectory> for InMemorySequence {
    fn from(traj: Trajectory) -> Self {
        Self::new(traj)
    }
}

impl FrameSource for InMemorySequence {
    fn frame_count(&self) -> usize {
        self.traj.n_frames()
    }

    fn atom_count(&self) -> usize {
        self.traj.n_atoms()
    }

    fn has_box(&self) -> bool {
        self.traj.has_box()
    }

    fn has_temperatures(&self) -> bool {
        self.traj.has_temperatures()
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>> {
        self.traj.frame(index)
    }

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        check_index(index, self.traj.n_frames())?;
        self.traj.frame(index)?.temperature().ok_or_else(|| {
            TrajError::Capability(format!("in-memory frame {index} has no temperature"))
        })
    }
}
