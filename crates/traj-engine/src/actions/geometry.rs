use traj_core::centers::{center_of_coords, radius_of_gyration, rms_deviation};
use traj_core::error::TrajResult;
use traj_core::frame::FrameView;
use traj_core::topology::Topology;

use crate::action::{Action, Dataset};

/// Radius of gyration per frame, mass-weighted when a topology is attached.
#[derive(Debug, Default)]
pub struct Radgyr {
    masses: Option<Vec<f64>>,
    results: Vec<f64>,
}

impl Action for Radgyr {
    fn name(&self) -> &'static str {
        "radgyr"
    }

    fn init(&mut self, topology: Option<&Topology>) -> TrajResult<()> {
        self.results.clear();
        self.masses = topology
            .map(|top| top.atoms.mass.clone())
            .filter(|masses| masses.iter().all(|&m| m > 0.0));
        Ok(())
    }

    fn process(&mut self, _index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        self.results
            .push(radius_of_gyration(frame.coordinates(), self.masses.as_deref()));
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}

#[derive(Debug, Default)]
pub struct CenterOfGeometry {
    results: Vec<[f64; 3]>,
}

impl Action for CenterOfGeometry {
    fn name(&self) -> &'static str {
        "center_of_geometry"
    }

    fn init(&mut self, _topology: Option<&Topology>) -> TrajResult<()> {
        self.results.clear();
        Ok(())
    }

    fn process(&mut self, _index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        self.results.push(center_of_coords(frame.coordinates(), None));
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Vectors(std::mem::take(&mut self.results)))
    }
}

/// RMS displacement of every atom from the previous delivered frame.
///
/// Depends on sequential delivery; the first frame reports zero.
#[derive(Debug, Default)]
pub struct Displacement {
    previous: Vec<[f64; 3]>,
    results: Vec<f64>,
}

impl Action for Displacement {
    fn name(&self) -> &'static str {
        "displacement"
    }

    fn init(&mut self, _topology: Option<&Topology>) -> TrajResult<()> {
        self.previous.clear();
        self.results.clear();
        Ok(())
    }

    fn process(&mut self, _index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        let coords = frame.coordinates();
        let value = if self.previous.is_empty() {
            0.0
        } else {
            rms_deviation(&self.previous, coords)?
        };
        self.results.push(value);
        self.previous.clear();
        self.previous.extend_from_slice(coords);
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}

/// RMSD to the first delivered frame, without superposition.
#[derive(Debug, Default)]
pub struct RmsdFirst {
    reference: Option<Vec<[f64; 3]>>,
    results: Vec<f64>,
}

impl Action for RmsdFirst {
    fn name(&self) -> &'static str {
        "rmsd_first"
    }

    fn init(&mut self, _topology: Option<&Topology>) -> TrajResult<()> {
        self.reference = None;
        self.results.clear();
        Ok(())
    }

    fn process(&mut self, _index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        let coords = frame.coordinates();
        let reference = self.reference.get_or_insert_with(|| coords.to_vec());
        self.results.push(rms_deviation(reference, coords)?);
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_core::frame::Frame;

    fn run(action: &mut dyn Action, frames: &[Frame]) -> Dataset {
        action.init(None).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            action.process(i, frame.view()).unwrap();
        }
        action.finalize().unwrap()
    }

    fn shifted(dx: f64) -> Frame {
        Frame::new(vec![[dx, 0.0, 0.0], [dx + 2.0, 0.0, 0.0]])
    }

    #[test]
    fn displacement_tracks_previous_frame() {
        let frames = [shifted(0.0), shifted(1.0), shifted(3.0)];
        let out = run(&mut Displacement::default(), &frames);
        assert_eq!(out, Dataset::Series(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn rmsd_first_is_relative_to_frame_zero() {
        let frames = [shifted(0.0), shifted(1.0), shifted(3.0)];
        let out = run(&mut RmsdFirst::default(), &frames);
        assert_eq!(out, Dataset::Series(vec![0.0, 1.0, 3.0]));
    }

    #[test]
    fn radgyr_of_a_pair() {
        let out = run(&mut Radgyr::default(), &[shifted(5.0)]);
        assert_eq!(out, Dataset::Series(vec![1.0]));
    }

    #[test]
    fn center_of_geometry_per_frame() {
        let out = run(&mut CenterOfGeometry::default(), &[shifted(0.0), shifted(2.0)]);
        assert_eq!(out, Dataset::Vectors(vec![[1.0, 0.0, 0.0], [3.0, 0.0, 0.0]]));
    }
}
