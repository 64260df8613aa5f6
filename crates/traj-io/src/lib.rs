pub mod dcd;
pub mod iterator;
pub mod load;
pub mod memory;
pub mod remd;
pub mod stream;
pub mod temperature;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::{Frame, FrameView};

pub use dcd::DcdDecoder;
pub use iterator::{FrameCursor, TrajectoryIterator};
pub use load::{iterload, load_remd, open_dcd, open_remd};
pub use memory::InMemorySequence;
pub use remd::{RemdOptions, TemperatureFilteredStream};
pub use stream::LazyFileStream;
pub use temperature::TemperatureLog;

/// Uniform random-access view over a sequence of frames.
///
/// `frame_at` takes `&mut self` because file-backed sources own a single
/// read handle and a single decode buffer: the returned view borrows that
/// buffer until the next call. Sharing one source across threads is not
/// supported; open one source per thread instead.
pub trait FrameSource {
    fn frame_count(&self) -> usize;
    fn atom_count(&self) -> usize;
    fn has_box(&self) -> bool;

    fn has_temperatures(&self) -> bool {
        false
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>>;

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        let _ = index;
        Err(TrajError::Capability(
            "frame source carries no temperature data".into(),
        ))
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn atom_count(&self) -> usize {
        (**self).atom_count()
    }

    fn has_box(&self) -> bool {
        (**self).has_box()
    }

    fn has_temperatures(&self) -> bool {
        (**self).has_temperatures()
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>> {
        (**self).frame_at(index)
    }

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        (**self).temperature_at(index)
    }
}

/// What a decoder learns from a file header without touching frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderHeader {
    pub frame_count: Option<usize>,
    pub atom_count: usize,
    pub has_box: bool,
}

/// Format-specific frame decoder behind a `LazyFileStream`.
pub trait FrameDecoder {
    fn header(&self) -> DecoderHeader;

    /// Decodes frame `index` into `out`, which is already sized to the atom count.
    fn decode_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()>;

    /// Per-frame temperatures stored in the file itself, if any.
    fn temperatures(&mut self) -> TrajResult<Option<Vec<f64>>> {
        Ok(None)
    }
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn header(&self) -> DecoderHeader {
        (**self).header()
    }

    fn decode_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()> {
        (**self).decode_frame(index, out)
    }

    fn temperatures(&mut self) -> TrajResult<Option<Vec<f64>>> {
        (**self).temperatures()
    }
}

pub(crate) fn check_index(index: usize, len: usize) -> TrajResult<()> {
    if index >= len {
        return Err(TrajError::index("frame", index, len));
    }
    Ok(())
}
