use tracing::debug;

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::{Frame, FrameView};

use crate::temperature::TemperatureLog;
use crate::{check_index, DecoderHeader, FrameDecoder, FrameSource};

/// File-backed frame source that decodes one frame at a time into a reused buffer.
///
/// Requesting the same index twice in a row does not decode again, and the
/// decoder only has to seek when indices are not consecutive.
#[derive(Debug)]
pub struct LazyFileStream<D> {
    decoder: D,
    header: DecoderHeader,
    n_frames: usize,
    buffer: Frame,
    loaded: Option<usize>,
    temperatures: Option<Vec<f64>>,
}

impl<D: FrameDecoder> LazyFileStream<D> {
    /// Fails with `UnsupportedFormat` when the decoder cannot report a frame
    /// count from its header.
    pub fn open(mut decoder: D) -> TrajResult<Self> {
        let header = decoder.header();
        let n_frames = header.frame_count.ok_or_else(|| {
            TrajError::UnsupportedFormat(
                "frame count is not discoverable from the file header".into(),
            )
        })?;
        let temperatures = decoder.temperatures()?;
        if let Some(temps) = &temperatures {
            check_temperature_len(temps.len(), n_frames)?;
        }
        debug!(
            n_frames,
            n_atoms = header.atom_count,
            has_box = header.has_box,
            has_temperatures = temperatures.is_some(),
            "opened lazy frame stream"
        );
        Ok(Self {
            decoder,
            header,
            n_frames,
            buffer: Frame::zeros(header.atom_count),
            loaded: None,
            temperatures,
        })
    }

    /// Attaches an auxiliary temperature stream, replacing any in-file temperatures.
    pub fn with_temperature_log(mut self, log: TemperatureLog) -> TrajResult<Self> {
        check_temperature_len(log.len(), self.n_frames)?;
        self.temperatures = Some(log.into_values());
        self.loaded = None;
        Ok(self)
    }

    pub fn temperatures(&self) -> Option<&[f64]> {
        self.temperatures.as_deref()
    }

    pub fn header(&self) -> DecoderHeader {
        self.header
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn into_decoder(self) -> D {
        self.decoder
    }

    fn load(&mut self, index: usize) -> TrajResult<()> {
        if self.loaded == Some(index) {
            return Ok(());
        }
        self.loaded = None;
        self.buffer.reset(self.header.atom_count);
        match self.decoder.decode_frame(index, &mut self.buffer) {
            Ok(()) => {}
            Err(TrajError::Io(err)) => {
                return Err(TrajError::Decode {
                    index,
                    reason: err.to_string(),
                })
            }
            Err(err) => return Err(err),
        }
        if self.buffer.atom_count() != self.header.atom_count {
            return Err(TrajError::Decode {
                index,
                reason: format!(
                    "decoded {} atoms, header declares {}",
                    self.buffer.atom_count(),
                    self.header.atom_count
                ),
            });
        }
        if let Some(temps) = &self.temperatures {
            self.buffer.set_temperature(Some(temps[index]));
        }
        self.loaded = Some(index);
        Ok(())
    }
}

fn check_temperature_len(len: usize, n_frames: usize) -> TrajResult<()> {
    if len != n_frames {
        return Err(TrajError::validation(
            "temperature stream",
            format!("{len} temperatures for {n_frames} frames"),
        ));
    }
    Ok(())
}

impl<D: FrameDecoder> FrameSource for LazyFileStream<D> {
    fn frame_count(&self) -> usize {
        self.n_frames
    }

    fn atom_count(&self) -> usize {
        self.header.atom_count
    }

    fn has_box(&self) -> bool {
        self.header.has_box
    }

    fn has_temperatures(&self) -> bool {
        self.temperatures.is_some()
    }

    fn frame_at(&mut self, index: usize) -> TrajResult<FrameView<'_>> {
        check_index(index, self.n_frames)?;
        self.load(index)?;
        Ok(self.buffer.view())
    }

    fn temperature_at(&self, index: usize) -> TrajResult<f64> {
        check_index(index, self.n_frames)?;
        match &self.temperatures {
            Some(temps) => Ok(temps[index]),
            None => Err(TrajError::Capability(
                "stream has neither in-file temperatures nor a temperature log".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountingDecoder {
        frames: Vec<Vec<[f64; 3]>>,
        declare_count: bool,
        decodes: usize,
    }

    impl FrameDecoder for CountingDecoder {
        fn header(&self) -> DecoderHeader {
            DecoderHeader {
                frame_count: self.declare_count.then_some(self.frames.len()),
                atom_count: self.frames[0].len(),
                has_box: false,
            }
        }

        fn decode_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()> {
            self.decodes += 1;
            out.coordinates_mut().copy_from_slice(&self.frames[index]);
            Ok(())
        }
    }

    fn decoder(declare_count: bool) -> CountingDecoder {
        CountingDecoder {
            frames: vec![vec![[0.0; 3]; 2], vec![[1.0; 3]; 2], vec![[2.0; 3]; 2]],
            declare_count,
            decodes: 0,
        }
    }

    #[test]
    fn open_without_frame_count_is_unsupported() {
        let err = LazyFileStream::open(decoder(false)).unwrap_err();
        assert!(matches!(err, TrajError::UnsupportedFormat(_)));
    }

    #[test]
    fn repeated_index_decodes_once() {
        let mut stream = LazyFileStream::open(decoder(true)).unwrap();
        assert_eq!(stream.frame_at(1).unwrap().atom(0).unwrap(), [1.0; 3]);
        assert_eq!(stream.frame_at(1).unwrap().atom(1).unwrap(), [1.0; 3]);
        assert_eq!(stream.decoder().decodes, 1);
        assert_eq!(stream.frame_at(2).unwrap().atom(0).unwrap(), [2.0; 3]);
        assert_eq!(stream.decoder().decodes, 2);
    }

    #[test]
    fn out_of_range_frame_is_index_error() {
        let mut stream = LazyFileStream::open(decoder(true)).unwrap();
        assert!(matches!(
            stream.frame_at(3),
            Err(TrajError::Index { index: 3, len: 3, .. })
        ));
        assert_eq!(stream.decoder().decodes, 0);
    }

    #[test]
    fn temperature_log_length_must_match() {
        let stream = LazyFileStream::open(decoder(true)).unwrap();
        let err = stream
            .with_temperature_log(TemperatureLog::from_values(vec![300.0; 2]))
            .unwrap_err();
        assert!(matches!(err, TrajError::Validation { .. }));
    }

    #[test]
    fn temperatures_flow_into_frames() {
        let mut stream = LazyFileStream::open(decoder(true))
            .unwrap()
            .with_temperature_log(TemperatureLog::from_values(vec![298.0, 300.0, 302.0]))
            .unwrap();
        assert!(stream.has_temperatures());
        assert_eq!(stream.frame_at(2).unwrap().temperature(), Some(302.0));
        assert_eq!(stream.temperature_at(0).unwrap(), 298.0);
    }
}
