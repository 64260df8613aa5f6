use traj_core::centers::distance;
use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::FrameView;
use traj_core::topology::Topology;

use crate::action::{Action, Capabilities, Dataset};

/// Unit cell volume per frame.
#[derive(Debug, Default)]
pub struct BoxVolume {
    results: Vec<f64>,
}

impl Action for BoxVolume {
    fn name(&self) -> &'static str {
        "box_volume"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(true, false, false)
    }

    fn init(&mut self, _topology: Option<&Topology>) -> TrajResult<()> {
        self.results.clear();
        Ok(())
    }

    fn process(&mut self, index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        let box_ = frame
            .box_()
            .ok_or_else(|| TrajError::Capability(format!("frame {index} has no unit cell")))?;
        self.results.push(box_.volume());
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}

/// Average length over the topology's bonds, per frame.
#[derive(Debug, Default)]
pub struct MeanBondLength {
    bonds: Vec<[usize; 2]>,
    results: Vec<f64>,
}

impl Action for MeanBondLength {
    fn name(&self) -> &'static str {
        "mean_bond_length"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(false, true, false)
    }

    fn init(&mut self, topology: Option<&Topology>) -> TrajResult<()> {
        self.results.clear();
        if let Some(top) = topology {
            top.validate()?;
        }
        let bonds = topology.map(Topology::bond_indices).unwrap_or_default();
        if bonds.is_empty() {
            return Err(TrajError::validation(self.name(), "topology has no bonds"));
        }
        self.bonds = bonds.to_vec();
        Ok(())
    }

    fn process(&mut self, _index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        let mut total = 0.0;
        for &[a, b] in &self.bonds {
            total += distance(frame.atom(a)?, frame.atom(b)?);
        }
        self.results.push(total / self.bonds.len() as f64);
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}

/// Replica temperature of every delivered frame.
#[derive(Debug, Default)]
pub struct Temperature {
    results: Vec<f64>,
}

impl Action for Temperature {
    fn name(&self) -> &'static str {
        "temperature"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new(false, false, true)
    }

    fn init(&mut self, _topology: Option<&Topology>) -> TrajResult<()> {
        self.results.clear();
        Ok(())
    }

    fn process(&mut self, index: usize, frame: FrameView<'_>) -> TrajResult<()> {
        let temperature = frame
            .temperature()
            .ok_or_else(|| TrajError::Capability(format!("frame {index} has no temperature")))?;
        self.results.push(temperature);
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.results)))
    }
}
