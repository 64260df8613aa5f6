#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use traj_core::{Box3, Frame, Topology, Trajectory};

pub fn water_topology(n_molecules: usize) -> Arc<Topology> {
    let mut builder = Topology::builder();
    for _ in 0..n_molecules {
        builder = builder.residue("WAT", &[("O", "O"), ("H1", "H"), ("H2", "H")]);
    }
    Arc::new(builder.build().expect("topology"))
}

/// Deterministic coordinates: atom `a` of frame `f` sits at `(f, a, f * 0.5 + a)`.
pub fn ramp_frames(n_frames: usize, n_atoms: usize, box_: Option<Box3>) -> Vec<Frame> {
    (0..n_frames)
        .map(|f| {
            let coords = (0..n_atoms)
                .map(|a| [f as f64, a as f64, f as f64 * 0.5 + a as f64])
                .collect();
            Frame::new(coords).with_box(box_)
        })
        .collect()
}

pub fn ramp_trajectory(n_frames: usize, topology: &Arc<Topology>, box_: Option<Box3>) -> Trajectory {
    let mut traj = Trajectory::with_topology(topology.clone());
    for frame in ramp_frames(n_frames, topology.n_atoms(), box_) {
        traj.push(frame).expect("push frame");
    }
    traj
}

fn record(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
}

/// Writes a little-endian CHARMM-style DCD with 4-byte record markers.
pub fn write_dcd(path: &Path, frames: &[Frame]) {
    let n_atoms = frames[0].atom_count();
    let with_cell = frames[0].box_().is_some();
    let mut buf = Vec::new();

    let mut header = b"CORD".to_vec();
    let mut icntrl = [0i32; 20];
    icntrl[0] = frames.len() as i32;
    icntrl[10] = with_cell as i32;
    for word in icntrl {
        header.extend_from_slice(&word.to_le_bytes());
    }
    record(&mut buf, &header);

    let mut title = 1i32.to_le_bytes().to_vec();
    let mut line = [b' '; 80];
    line[..13].copy_from_slice(b"traj-io tests");
    title.extend_from_slice(&line);
    record(&mut buf, &title);
    record(&mut buf, &(n_atoms as i32).to_le_bytes());

    for frame in frames {
        if let Some(box_) = frame.box_() {
            let cell: Vec<u8> = box_
                .to_array()
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            record(&mut buf, &cell);
        }
        for axis in 0..3 {
            let payload: Vec<u8> = frame
                .coordinates()
                .iter()
                .flat_map(|xyz| (xyz[axis] as f32).to_le_bytes())
                .collect();
            record(&mut buf, &payload);
        }
    }
    fs::write(path, buf).expect("write dcd");
}

pub fn dcd_fixture(dir: &TempDir, name: &str, frames: &[Frame]) -> PathBuf {
    let path = dir.path().join(name);
    write_dcd(&path, frames);
    path
}

pub fn write_temperature_log(dir: &TempDir, name: &str, temps: &[f64]) -> PathBuf {
    let path = dir.path().join(name);
    let mut text = String::from("# frame temperature\n");
    for (i, t) in temps.iter().enumerate() {
        text.push_str(&format!("{i} {t}\n"));
    }
    fs::write(&path, text).expect("write temperature log");
    path
}
