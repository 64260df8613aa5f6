use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};
use crate::frame::Box3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomTable {
    pub name: Vec<String>,
    pub element: Vec<String>,
    pub mass: Vec<f64>,
}

impl AtomTable {
    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Contiguous atom span `[first_atom, last_atom)` sharing a residue name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residue {
    pub name: String,
    pub first_atom: usize,
    pub last_atom: usize,
}

impl Residue {
    pub fn atom_range(&self) -> Range<usize> {
        self.first_atom..self.last_atom
    }

    pub fn n_atoms(&self) -> usize {
        self.last_atom - self.first_atom
    }
}

/// Static description of the simulated system, shared by every frame.
///
/// Trajectories and iterators hold it behind an `Arc`, so copying a
/// trajectory never duplicates the topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub atoms: AtomTable,
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
    #[serde(default)]
    pub residues: Vec<Residue>,
    #[serde(default, rename = "box")]
    pub box_: Option<Box3>,
}

impl Topology {
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn n_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn has_box(&self) -> bool {
        self.box_.is_some()
    }

    pub fn element(&self, atom: usize) -> TrajResult<&str> {
        self.atoms
            .element
            .get(atom)
            .map(String::as_str)
            .ok_or_else(|| TrajError::index("atom", atom, self.n_atoms()))
    }

    pub fn bond_indices(&self) -> &[[usize; 2]] {
        &self.bonds
    }

    pub fn residue_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.residues.iter().map(|r| r.name.as_str())
    }

    pub fn residue_atoms(&self, residue: usize) -> TrajResult<Range<usize>> {
        self.residues
            .get(residue)
            .map(Residue::atom_range)
            .ok_or_else(|| TrajError::index("residue", residue, self.residues.len()))
    }

    /// Checks column lengths, bond endpoints and residue spans.
    pub fn validate(&self) -> TrajResult<()> {
        let n_atoms = self.atoms.name.len();
        if self.atoms.element.len() != n_atoms || self.atoms.mass.len() != n_atoms {
            return Err(TrajError::Shape(format!(
                "atom table columns disagree: {} names, {} elements, {} masses",
                n_atoms,
                self.atoms.element.len(),
                self.atoms.mass.len()
            )));
        }
        for &[a, b] in &self.bonds {
            for idx in [a, b] {
                if idx >= n_atoms {
                    return Err(TrajError::index("bond atom", idx, n_atoms));
                }
            }
        }
        let mut expected_first = 0usize;
        for (i, res) in self.residues.iter().enumerate() {
            if res.first_atom != expected_first || res.last_atom < res.first_atom {
                return Err(TrajError::Shape(format!(
                    "residue {i} ({}) spans {}..{}, expected to start at {expected_first}",
                    res.name, res.first_atom, res.last_atom
                )));
            }
            expected_first = res.last_atom;
        }
        if !self.residues.is_empty() && expected_first != n_atoms {
            return Err(TrajError::Shape(format!(
                "residues cover {expected_first} atoms but topology has {n_atoms}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    topology: Topology,
}

impl TopologyBuilder {
    /// Appends a residue made of `(atom name, element)` pairs.
    pub fn residue(mut self, name: &str, atoms: &[(&str, &str)]) -> Self {
        let first_atom = self.topology.atoms.len();
        for &(atom_name, element) in atoms {
            let table = &mut self.topology.atoms;
            table.name.push(atom_name.to_string());
            table.element.push(element.to_string());
            table.mass.push(mass_for_element(element));
        }
        self.topology.residues.push(Residue {
            name: name.to_string(),
            first_atom,
            last_atom: self.topology.atoms.len(),
        });
        self
    }

    pub fn bond(mut self, a: usize, b: usize) -> Self {
        self.topology.bonds.push([a, b]);
        self
    }

    pub fn with_box(mut self, box_: Option<Box3>) -> Self {
        self.topology.box_ = box_;
        self
    }

    pub fn build(self) -> TrajResult<Topology> {
        self.topology.validate()?;
        Ok(self.topology)
    }
}

pub fn mass_for_element(element: &str) -> f64 {
    match element.trim().to_ascii_uppercase().as_str() {
        "H" => 1.008,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        "P" => 30.974,
        "S" => 32.06,
        "NA" => 22.990,
        "CL" => 35.45,
        _ => 0.0,
    }
}
