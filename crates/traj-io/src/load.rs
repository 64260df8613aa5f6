use std::path::Path;
use std::sync::Arc;

use tracing::info;

use traj_core::error::{TrajError, TrajResult};
use traj_core::topology::Topology;

use crate::dcd::DcdDecoder;
use crate::iterator::TrajectoryIterator;
use crate::remd::{RemdOptions, TemperatureFilteredStream};
use crate::stream::LazyFileStream;
use crate::temperature::TemperatureLog;

/// Opens a single DCD file as a lazy stream.
pub fn open_dcd(path: impl AsRef<Path>) -> TrajResult<LazyFileStream<DcdDecoder>> {
    LazyFileStream::open(DcdDecoder::open(path)?)
}

/// Opens a DCD file and keeps only the frames whose logged temperature matches.
pub fn open_remd(
    path: impl AsRef<Path>,
    log_path: impl AsRef<Path>,
    options: RemdOptions,
) -> TrajResult<TemperatureFilteredStream<DcdDecoder>> {
    let stream = open_dcd(path)?;
    let log = TemperatureLog::open(log_path)?;
    TemperatureFilteredStream::with_log(stream, log, options)
}

/// Chains one lazy segment per DCD path, in the order given.
pub fn iterload<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    topology: Arc<Topology>,
) -> TrajResult<TrajectoryIterator> {
    let mut iter = TrajectoryIterator::new(topology);
    for path in paths {
        iter.add_segment(open_dcd(path)?)?;
    }
    if iter.n_segments() == 0 {
        return Err(TrajError::NotFound("no trajectory paths given".into()));
    }
    info!(
        segments = iter.n_segments(),
        n_frames = iter.n_frames(),
        n_atoms = iter.n_atoms(),
        "loaded lazy trajectory"
    );
    Ok(iter)
}

/// Single-temperature view over a replica-exchange run, as a trajectory iterator.
pub fn load_remd(
    path: impl AsRef<Path>,
    topology: Arc<Topology>,
    log_path: impl AsRef<Path>,
    options: RemdOptions,
) -> TrajResult<TrajectoryIterator> {
    TrajectoryIterator::new(topology).with_segment(open_remd(path, log_path, options)?)
}
