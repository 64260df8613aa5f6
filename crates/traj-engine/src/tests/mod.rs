use super::*;
use std::sync::Arc;
use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::{Box3, Frame, FrameView};
use traj_core::topology::Topology;
use traj_core::trajectory::Trajectory;
use traj_io::{DecoderHeader, FrameDecoder, InMemorySequence, LazyFileStream};

/// Serves prepared frames and counts every decode.
#[derive(Debug)]
struct CountingDecoder {
    frames: Vec<Frame>,
    has_box: bool,
    fail_at: Option<usize>,
    reads: usize,
}

impl FrameDecoder for CountingDecoder {
    fn header(&self) -> DecoderHeader {
        DecoderHeader {
            frame_count: Some(self.frames.len()),
            atom_count: self.frames[0].atom_count(),
            has_box: self.has_box,
        }
    }

    fn decode_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()> {
        self.reads += 1;
        if self.fail_at == Some(index) {
            return Err(TrajError::Decode {
                index,
                reason: "corrupt coordinate record".into(),
            });
        }
        out.coordinates_mut()
            .copy_from_slice(self.frames[index].coordinates());
        out.set_box(self.frames[index].box_());
        Ok(())
    }
}

/// Records the logical index of every frame it sees.
#[derive(Debug, Default)]
struct FrameLog {
    seen: Vec<f64>,
}

impl Action for FrameLog {
    fn name(&self) -> &'static str {
        "frame_log"
    }

    fn process(&mut self, index: usize, _frame: FrameView<'_>) -> TrajResult<()> {
        self.seen.push(index as f64);
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(std::mem::take(&mut self.seen)))
    }
}

#[derive(Debug)]
struct FailingAction {
    fail_at: usize,
}

impl Action for FailingAction {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn process(&mut self, index: usize, _frame: FrameView<'_>) -> TrajResult<()> {
        if index == self.fail_at {
            return Err(TrajError::Shape("synthetic failure".into()));
        }
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(Vec::new()))
    }
}

/// Processes every frame but cannot produce a result.
#[derive(Debug, Default)]
struct BrokenFinalize;

impl Action for BrokenFinalize {
    fn name(&self) -> &'static str {
        "broken_finalize"
    }

    fn process(&mut self, _index: usize, _frame: FrameView<'_>) -> TrajResult<()> {
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Err(TrajError::Shape("accumulator lost".into()))
    }
}

/// Trips a cancel token once it has seen `after` frames.
#[derive(Debug)]
struct CancelAfter {
    token: CancelToken,
    after: usize,
    seen: usize,
}

impl Action for CancelAfter {
    fn name(&self) -> &'static str {
        "cancel_after"
    }

    fn process(&mut self, _index: usize, _frame: FrameView<'_>) -> TrajResult<()> {
        self.seen += 1;
        if self.seen == self.after {
            self.token.cancel();
        }
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(vec![self.seen as f64]))
    }
}

#[derive(Debug)]
struct NeedsAtoms(usize);

impl Action for NeedsAtoms {
    fn name(&self) -> &'static str {
        "needs_atoms"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_expected_atoms(self.0)
    }

    fn process(&mut self, _index: usize, _frame: FrameView<'_>) -> TrajResult<()> {
        Ok(())
    }

    fn finalize(&mut self) -> TrajResult<Dataset> {
        Ok(Dataset::Series(Vec::new()))
    }
}

/// Linear chain of carbons, bonded in sequence.
fn chain_topology(n_atoms: usize) -> Arc<Topology> {
    let atoms: Vec<(&str, &str)> = vec![("C", "C"); n_atoms];
    let mut builder = Topology::builder().residue("CHN", &atoms);
    for i in 1..n_atoms {
        builder = builder.bond(i - 1, i);
    }
    Arc::new(builder.build().unwrap())
}

/// Atom `a` of frame `f` sits at `(f + a, 0, 0)`.
fn sliding_frames(n_frames: usize, n_atoms: usize, box_: Option<Box3>) -> Vec<Frame> {
    (0..n_frames)
        .map(|f| {
            let coords = (0..n_atoms).map(|a| [(f + a) as f64, 0.0, 0.0]).collect();
            Frame::new(coords).with_box(box_)
        })
        .collect()
}

fn memory_source(n_frames: usize, n_atoms: usize, box_: Option<Box3>) -> InMemorySequence {
    InMemorySequence::new(Trajectory::from_frames(sliding_frames(n_frames, n_atoms, box_)).unwrap())
}

fn counting_stream(
    n_frames: usize,
    n_atoms: usize,
    box_: Option<Box3>,
    fail_at: Option<usize>,
) -> LazyFileStream<CountingDecoder> {
    LazyFileStream::open(CountingDecoder {
        frames: sliding_frames(n_frames, n_atoms, box_),
        has_box: box_.is_some(),
        fail_at,
        reads: 0,
    })
    .unwrap()
}

fn series(output: &RunOutput, key: &str) -> Vec<f64> {
    output
        .get(key)
        .and_then(Dataset::as_series)
        .unwrap_or_else(|| panic!("no series for {key}"))
        .to_vec()
}

include!("part1.rs");
include!("part2.rs");
include!("part3.rs");
