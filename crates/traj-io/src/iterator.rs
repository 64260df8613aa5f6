use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::{resolve_range, Frame, FrameView};
use traj_core::topology::Topology;
use traj_core::trajectory::Trajectory;

use crate::{check_index, FrameSource};

/// Read-mostly handle over one or more frame sources laid end to end.
///
/// Global frame `i` lives in the segment whose cumulative range contains
/// `i`; nothing is materialized until `slice` is called. The topology is
/// shared with whatever else holds the `Arc`.
pub struct TrajectoryIterator {
    topology: Arc<Topology>,
    segments: Vec<Box<dyn FrameSource + Send>>,
    offsets: Vec<usize>,
}

impl fmt::Debug for TrajectoryIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrajectoryIterator")
            .field("n_atoms", &self.topology.n_atoms())
            .field("n_frames", &self.n_frames())
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl TrajectoryIterator {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            segments: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Appends a segment after the current last frame.
    pub fn add_segment<S>(&mut self, segment: S) -> TrajResult<()>
    where
        S: FrameSource + Send + 'static,
    {
        if segment.atom_count() != self.topology.n_atoms() {
            return Err(TrajError::Shape(format!(
                "segment {} has {} atoms but topology has {}",
                self.segments.len(),
                segment.atom_count(),
                self.topology.n_atoms()
            )));
        }
        let end = self.n_frames() + segment.frame_count();
        self.segments.push(Box::new(segment));
        self.offsets.push(end);
        Ok(())
    }

    pub fn with_segment<S>(mut self, segment: S) -> TrajResult<Self>
    where
        S: FrameSource + Send + 'static,
    {
        self.add_segment(segment)?;
        Ok(self)
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn n_frames(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn n_atoms(&self) -> usize {
        self.topology.n_atoms()
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    fn locate(&self, index: usize) -> TrajResult<(usize, usize)> {
        check_index(index, self.n_frames())?;
        let segment = self.offsets.partition_point(|&start| start <= index) - 1;
        Ok((segment, index - self.offsets[segment]))
    }

    /// Fresh pass from frame 0. Each call starts over, independent of earlier passes.
    pub fn iter(&mut self) -> FrameCursor<'_, Self> {
        FrameCursor::new(self)
    }

    /// Like `iter`, but copies every frame out so it can be used as a std iterator.
    pub fn iter_owned(&mut self) -> impl Iterator<Item = TrajResult<Frame>> + '_ {
        let n_frames = self.n_frames();
        (0..n_frames).map(move |i| self.frame_at(i).map(|view| view.to_frame()))
    }

    /// Decodes a frame range into a new in-memory trajectory sharing this topology.
    pub fn slice(&mut self, range: impl RangeBounds<usize>) -> TrajResult<Trajectory> {
        let range = resolve_range(range, self.n_frames(), "frame")?;
        let mut traj = Trajectory::with_topology(self.topology.clone());
        for index in range {
            let frame = self.frame_at(index)?;
            traj.append(frame)?;
        }
        Ok(traj)
    }

    /// Per-frame temperatures across all segments, produced on demand.
    pub fn temperatures(&self) -> TrajResult<impl Iterator<Item = TrajResult<f64>> + '_> {
        if let Some(pos) = self.segments.iter().position(|s| !s.has_temperatures()) {
            return Err(TrajError::Capability(format!(
                "segment {pos} carries no temperature data"
            )));
        }
        Ok((0..self.n_frames()).map(move |i| self.temperature_at(i)))
    }
}

impl FrameSource for TrajectoryIterator {
    fn frame_count(&self) -> usize {
        self.n_frames()
    }

    fn atom_count(&self) -> usize {
        self.topology.n_atoms()
    }

    fn has_box(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(|s| s.has_box())
    }

    fn has_temperatures(&self) -> bool {
        !self.segments.is_empty() && self.segments.iter().all(|s| s.has_temperatures())
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>> {
        let (segment, local) = self.locate(index)?;
        self.segments[segment].frame_at(local)
    }

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        let (segment, local) = self.locate(index)?;
        self.segments[segment].temperature_at(local)
    }
}

/// Lending cursor over any frame source in increasing index order.
///
/// Each view borrows the source until the next call, so frames cannot be
/// held across iterations; copy with `to_frame` when needed.
pub struct FrameCursor<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
    next: usize,
    end: usize,
}

impl<'a, S: FrameSource + ?Sized> FrameCursor<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        let end = source.frame_count();
        Self {
            source,
            next: 0,
            end,
        }
    }

    pub fn position(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.end - self.next
    }

    pub fn next_frame(&mut self) -> Option<TrajResult<FrameView<'_>>> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.source.frame_at(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySequence;

    fn topology(n_atoms: usize) -> Arc<Topology> {
        let atoms: Vec<(&str, &str)> = vec![("C", "C"); n_atoms];
        Arc::new(Topology::builder().residue("MOL", &atoms).build().unwrap())
    }

    fn sequence(values: &[f64], n_atoms: usize) -> InMemorySequence {
        let frames = values.iter().map(|&v| Frame::new(vec![[v; 3]; n_atoms]));
        InMemorySequence::new(Trajectory::from_frames(frames).unwrap())
    }

    fn collect_firsts(iter: &mut TrajectoryIterator) -> Vec<f64> {
        let mut out = Vec::new();
        let mut cursor = iter.iter();
        while let Some(frame) = cursor.next_frame() {
            out.push(frame.unwrap().atom(0).unwrap()[0]);
        }
        out
    }

    #[test]
    fn global_index_crosses_segments() {
        let mut iter = TrajectoryIterator::new(topology(2))
            .with_segment(sequence(&[0.0, 1.0, 2.0], 2))
            .unwrap()
            .with_segment(sequence(&[3.0, 4.0], 2))
            .unwrap();
        assert_eq!(iter.n_frames(), 5);
        assert_eq!(iter.frame_at(3).unwrap().atom(0).unwrap(), [3.0; 3]);
        assert_eq!(iter.frame_at(2).unwrap().atom(1).unwrap(), [2.0; 3]);
        assert!(matches!(
            iter.frame_at(5),
            Err(TrajError::Index { index: 5, len: 5, .. })
        ));
    }

    #[test]
    fn two_passes_match() {
        let mut iter = TrajectoryIterator::new(topology(1))
            .with_segment(sequence(&[0.0, 1.0], 1))
            .unwrap()
            .with_segment(sequence(&[2.0], 1))
            .unwrap();
        let first = collect_firsts(&mut iter);
        let second = collect_firsts(&mut iter);
        assert_eq!(first, vec![0.0, 1.0, 2.0]);
        assert_eq!(first, second);
    }

    #[test]
    fn mismatched_segment_is_rejected() {
        let mut iter = TrajectoryIterator::new(topology(2));
        let err = iter.add_segment(sequence(&[0.0], 3)).unwrap_err();
        assert!(matches!(err, TrajError::Shape(_)));
        assert_eq!(iter.n_segments(), 0);
    }

    #[test]
    fn slice_materializes_a_copy() {
        let mut iter = TrajectoryIterator::new(topology(1))
            .with_segment(sequence(&[0.0, 1.0, 2.0, 3.0], 1))
            .unwrap();
        let mut traj = iter.slice(1..3).unwrap();
        assert_eq!(traj.n_frames(), 2);
        traj.set_atom(0, 0, [9.0; 3]).unwrap();
        assert_eq!(iter.frame_at(1).unwrap().atom(0).unwrap(), [1.0; 3]);
        assert!(Arc::ptr_eq(traj.topology().unwrap(), iter.topology()));
    }

    #[test]
    fn temperatures_need_every_segment() {
        let hot = {
            let frames = (0..2).map(|_| Frame::new(vec![[0.0; 3]]).with_temperature(Some(310.0)));
            InMemorySequence::new(Trajectory::from_frames(frames).unwrap())
        };
        let mut iter = TrajectoryIterator::new(topology(1)).with_segment(hot).unwrap();
        let temps: Vec<f64> = iter
            .temperatures()
            .unwrap()
            .collect::<TrajResult<_>>()
            .unwrap();
        assert_eq!(temps, vec![310.0, 310.0]);

        iter.add_segment(sequence(&[0.0], 1)).unwrap();
        assert!(matches!(iter.temperatures(), Err(TrajError::Capability(_))));
    }
}
