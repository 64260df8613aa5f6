use std::ops::{Range, RangeBounds};
use std::sync::Arc;

use crate::error::{TrajError, TrajResult};
use crate::frame::{resolve_range, Box3, Frame, FrameView, FrameViewMut};
use crate::topology::Topology;

/// Fully materialized, mutable sequence of frames in simulation-time order.
///
/// Coordinates of all frames live in one contiguous buffer
/// (`n_frames * n_atoms` rows). The two access modes differ:
///
/// * `frame(i)` / `frame_mut(i)` hand out views into that buffer, so
///   edits through `frame_mut` are visible to every later reader.
/// * `slice`, `select` and `clone` copy coordinates into a new, independent
///   trajectory. Only the topology `Arc` is shared.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    n_atoms: Option<usize>,
    coords: Vec<[f64; 3]>,
    boxes: Vec<Option<Box3>>,
    temperatures: Vec<Option<f64>>,
    times: Vec<Option<f64>>,
    topology: Option<Arc<Topology>>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topology(topology: Arc<Topology>) -> Self {
        Self {
            n_atoms: Some(topology.n_atoms()),
            topology: Some(topology),
            ..Self::default()
        }
    }

    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> TrajResult<Self> {
        let mut traj = Self::new();
        for frame in frames {
            traj.push(frame)?;
        }
        Ok(traj)
    }

    pub fn n_frames(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Atom count shared by every frame; 0 until fixed by a topology or the first append.
    pub fn n_atoms(&self) -> usize {
        self.n_atoms.unwrap_or(0)
    }

    pub fn topology(&self) -> Option<&Arc<Topology>> {
        self.topology.as_ref()
    }

    pub fn set_topology(&mut self, topology: Arc<Topology>) -> TrajResult<()> {
        if let Some(n_atoms) = self.n_atoms {
            if topology.n_atoms() != n_atoms {
                return Err(TrajError::Shape(format!(
                    "topology has {} atoms but trajectory frames have {n_atoms}",
                    topology.n_atoms()
                )));
            }
        }
        self.n_atoms = Some(topology.n_atoms());
        self.topology = Some(topology);
        Ok(())
    }

    pub fn has_box(&self) -> bool {
        !self.boxes.is_empty() && self.boxes.iter().all(Option::is_some)
    }

    pub fn has_temperatures(&self) -> bool {
        !self.temperatures.is_empty() && self.temperatures.iter().all(Option::is_some)
    }

    /// Copies `frame` onto the end. Fails without touching existing data
    /// when the atom count differs.
    pub fn append(&mut self, frame: FrameView<'_>) -> TrajResult<()> {
        let n_atoms = *self.n_atoms.get_or_insert(frame.atom_count());
        if frame.atom_count() != n_atoms {
            return Err(TrajError::Shape(format!(
                "cannot append frame with {} atoms to trajectory of {n_atoms} atoms",
                frame.atom_count()
            )));
        }
        self.coords.extend_from_slice(frame.coordinates());
        self.boxes.push(frame.box_());
        self.temperatures.push(frame.temperature());
        self.times.push(frame.time_ps());
        Ok(())
    }

    pub fn push(&mut self, frame: Frame) -> TrajResult<()> {
        self.append(frame.view())
    }

    fn check_frame(&self, index: usize) -> TrajResult<()> {
        if index >= self.n_frames() {
            return Err(TrajError::index("frame", index, self.n_frames()));
        }
        Ok(())
    }

    fn rows(&self, index: usize) -> Range<usize> {
        let n_atoms = self.n_atoms();
        index * n_atoms..(index + 1) * n_atoms
    }

    fn view_at(&self, index: usize) -> FrameView<'_> {
        FrameView::new(
            &self.coords[self.rows(index)],
            self.boxes[index],
            self.temperatures[index],
            self.times[index],
        )
    }

    /// View of frame `index`; no copy.
    pub fn frame(&self, index: usize) -> TrajResult<FrameView<'_>> {
        self.check_frame(index)?;
        Ok(self.view_at(index))
    }

    /// Mutable view of frame `index`. Writes land in this trajectory's buffer.
    pub fn frame_mut(&mut self, index: usize) -> TrajResult<FrameViewMut<'_>> {
        self.check_frame(index)?;
        let rows = self.rows(index);
        Ok(FrameViewMut::new(
            &mut self.coords[rows],
            &mut self.boxes[index],
            &mut self.temperatures[index],
            &mut self.times[index],
        ))
    }

    /// `traj[frame, atom] = xyz`.
    pub fn set_atom(&mut self, frame: usize, atom: usize, xyz: [f64; 3]) -> TrajResult<()> {
        self.frame_mut(frame)?.set_row(atom, xyz)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = FrameView<'_>> + '_ {
        (0..self.n_frames()).map(move |i| self.view_at(i))
    }

    /// Every frame's coordinates, frame-major.
    pub fn xyz(&self) -> &[[f64; 3]] {
        &self.coords
    }

    pub fn temperatures(&self) -> Option<Vec<f64>> {
        self.temperatures.iter().copied().collect()
    }

    fn empty_like(&self, capacity: usize) -> Self {
        Self {
            n_atoms: self.n_atoms,
            coords: Vec::with_capacity(capacity * self.n_atoms()),
            boxes: Vec::with_capacity(capacity),
            temperatures: Vec::with_capacity(capacity),
            times: Vec::with_capacity(capacity),
            topology: self.topology.clone(),
        }
    }

    fn copy_frame_from(&mut self, src: &Trajectory, index: usize) {
        self.coords.extend_from_slice(&src.coords[src.rows(index)]);
        self.boxes.push(src.boxes[index]);
        self.temperatures.push(src.temperatures[index]);
        self.times.push(src.times[index]);
    }

    /// Deep copy of a frame range. The result never aliases `self`.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> TrajResult<Trajectory> {
        let range = resolve_range(range, self.n_frames(), "frame")?;
        let mut out = self.empty_like(range.len());
        for index in range {
            out.copy_frame_from(self, index);
        }
        Ok(out)
    }

    /// Deep copy of the listed frames in the given order; duplicates are kept.
    pub fn select(&self, indices: &[usize]) -> TrajResult<Trajectory> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_frames()) {
            return Err(TrajError::index("frame", bad, self.n_frames()));
        }
        let mut out = self.empty_like(indices.len());
        for &index in indices {
            out.copy_frame_from(self, index);
        }
        Ok(out)
    }

    /// Overwrites frames `start..start + src.n_frames()` with copies from `src`.
    pub fn assign(&mut self, start: usize, src: &Trajectory) -> TrajResult<()> {
        if src.is_empty() {
            return Ok(());
        }
        if src.n_atoms() != self.n_atoms() {
            return Err(TrajError::Shape(format!(
                "cannot assign frames with {} atoms into trajectory of {} atoms",
                src.n_atoms(),
                self.n_atoms()
            )));
        }
        let end = start + src.n_frames();
        if end > self.n_frames() {
            return Err(TrajError::index("frame", end - 1, self.n_frames()));
        }
        let n_atoms = self.n_atoms();
        self.coords[start * n_atoms..end * n_atoms].copy_from_slice(&src.coords);
        self.boxes[start..end].copy_from_slice(&src.boxes);
        self.temperatures[start..end].copy_from_slice(&src.temperatures);
        self.times[start..end].copy_from_slice(&src.times);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(n_atoms: usize, value: f64) -> Frame {
        Frame::new(vec![[value; 3]; n_atoms])
    }

    fn three_frames() -> Trajectory {
        Trajectory::from_frames((0..3).map(|i| frame(2, i as f64))).unwrap()
    }

    #[test]
    fn append_mismatch_leaves_trajectory_untouched() {
        let mut traj = three_frames();
        let before = traj.xyz().to_vec();
        let err = traj.push(frame(3, 9.0)).unwrap_err();
        assert!(matches!(err, TrajError::Shape(_)));
        assert_eq!(traj.n_frames(), 3);
        assert_eq!(traj.xyz(), before.as_slice());
    }

    #[test]
    fn frame_mut_aliases_storage() {
        let mut traj = three_frames();
        traj.set_atom(2, 0, [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(traj.frame(2).unwrap().atom(0).unwrap(), [1.0, 2.0, 3.0]);
        {
            let mut view = traj.frame_mut(1).unwrap();
            view.set_box(Some(Box3::orthorhombic(5.0, 5.0, 5.0)));
        }
        assert!(traj.frame(1).unwrap().has_box());
    }

    #[test]
    fn slice_is_a_copy() {
        let mut traj = three_frames();
        let mut tail = traj.slice(1..).unwrap();
        assert_eq!(tail.n_frames(), 2);
        tail.set_atom(0, 0, [7.0, 7.0, 7.0]).unwrap();
        assert_eq!(traj.frame(1).unwrap().atom(0).unwrap(), [1.0; 3]);
        traj.set_atom(2, 1, [8.0, 8.0, 8.0]).unwrap();
        assert_eq!(tail.frame(1).unwrap().atom(1).unwrap(), [2.0; 3]);
    }

    #[test]
    fn slice_shares_topology() {
        let top = Arc::new(
            Topology::builder()
                .residue("WAT", &[("O", "O"), ("H1", "H")])
                .build()
                .unwrap(),
        );
        let mut traj = Trajectory::with_topology(top.clone());
        traj.push(frame(2, 0.0)).unwrap();
        let copy = traj.slice(..).unwrap();
        assert!(Arc::ptr_eq(copy.topology().unwrap(), &top));
    }

    #[test]
    fn out_of_range_slice_is_index_error() {
        let traj = three_frames();
        assert!(matches!(
            traj.slice(1..5),
            Err(TrajError::Index { what: "frame", .. })
        ));
        assert!(matches!(
            traj.frame(3),
            Err(TrajError::Index { index: 3, len: 3, .. })
        ));
    }

    #[test]
    fn select_keeps_order_and_duplicates() {
        let traj = three_frames();
        let picked = traj.select(&[2, 0, 2]).unwrap();
        let firsts: Vec<f64> = picked.iter().map(|f| f.coordinates()[0][0]).collect();
        assert_eq!(firsts, vec![2.0, 0.0, 2.0]);
        assert!(traj.select(&[0, 3]).is_err());
    }

    #[test]
    fn assign_overwrites_in_place() {
        let mut traj = three_frames();
        let patch = Trajectory::from_frames(vec![frame(2, 5.0), frame(2, 6.0)]).unwrap();
        traj.assign(1, &patch).unwrap();
        assert_eq!(traj.frame(1).unwrap().atom(0).unwrap(), [5.0; 3]);
        assert_eq!(traj.frame(2).unwrap().atom(0).unwrap(), [6.0; 3]);

        let before = traj.xyz().to_vec();
        assert!(traj.assign(2, &patch).is_err());
        let wide = Trajectory::from_frames(vec![frame(4, 1.0)]).unwrap();
        assert!(matches!(traj.assign(0, &wide), Err(TrajError::Shape(_))));
        assert_eq!(traj.xyz(), before.as_slice());
    }

    #[test]
    fn set_topology_checks_atom_count() {
        let mut traj = three_frames();
        let top = Topology::builder()
            .residue("WAT", &[("O", "O")])
            .build()
            .unwrap();
        assert!(matches!(
            traj.set_topology(Arc::new(top)),
            Err(TrajError::Shape(_))
        ));
    }

    #[test]
    fn temperatures_require_every_frame() {
        let mut traj = Trajectory::new();
        traj.push(frame(1, 0.0).with_temperature(Some(300.0))).unwrap();
        assert_eq!(traj.temperatures(), Some(vec![300.0]));
        traj.push(frame(1, 0.0)).unwrap();
        assert_eq!(traj.temperatures(), None);
        assert!(!traj.has_temperatures());
    }

    proptest! {
        #[test]
        fn mismatched_append_never_mutates(
            n_atoms in 1usize..6,
            n_frames in 0usize..5,
            other in 0usize..8,
        ) {
            prop_assume!(other != n_atoms);
            let mut traj = Trajectory::new();
            for i in 0..n_frames {
                traj.push(frame(n_atoms, i as f64)).unwrap();
            }
            if n_frames == 0 {
                traj.push(frame(n_atoms, 0.0)).unwrap();
            }
            let frames_before = traj.n_frames();
            let xyz_before = traj.xyz().to_vec();
            let result = traj.push(frame(other, 1.0));
            prop_assert!(matches!(result, Err(TrajError::Shape(_))));
            prop_assert_eq!(traj.n_frames(), frames_before);
            prop_assert_eq!(traj.xyz(), xyz_before.as_slice());
        }
    }
}
