use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use traj_core::error::{TrajError, TrajResult};
use traj_core::frame::{Box3, Frame};

use crate::{DecoderHeader, FrameDecoder};

const DCD_IO_BUFFER_BYTES: usize = 256 * 1024;
const CONTROL_WORDS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn i32(self, raw: [u8; 4]) -> i32 {
        match self {
            Endian::Little => i32::from_le_bytes(raw),
            Endian::Big => i32::from_be_bytes(raw),
        }
    }

    fn f32(self, raw: [u8; 4]) -> f32 {
        match self {
            Endian::Little => f32::from_le_bytes(raw),
            Endian::Big => f32::from_be_bytes(raw),
        }
    }

    fn f64(self, raw: [u8; 8]) -> f64 {
        match self {
            Endian::Little => f64::from_le_bytes(raw),
            Endian::Big => f64::from_be_bytes(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellLayout {
    /// `[a, b, c, alpha, beta, gamma]`
    Standard,
    /// `[a, gamma, b, beta, alpha, c]`, written by CHARMM and NAMD.
    Charmm,
}

/// The header words this decoder cares about.
#[derive(Debug, Clone, Copy)]
struct Control {
    n_frames: i32,
    fixed_atoms: i32,
    has_cell: bool,
    four_dims: bool,
    charmm_version: i32,
}

/// Random-access decoder for CHARMM/NAMD DCD files.
///
/// Every frame occupies the same number of bytes, so frame `i` starts at
/// `data_start + i * stride` and the frame count follows from the file size.
#[derive(Debug)]
pub struct DcdDecoder {
    path: PathBuf,
    file: BufReader<File>,
    endian: Endian,
    marker_size: u64,
    n_atoms: usize,
    n_frames: usize,
    cell_len: Option<u64>,
    layout: CellLayout,
    data_start: u64,
    stride: u64,
    next_frame: Option<usize>,
    axis_buf: Vec<u8>,
}

impl DcdDecoder {
    pub fn open(path: impl AsRef<Path>) -> TrajResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::with_capacity(DCD_IO_BUFFER_BYTES, file);

        let (endian, marker_size, header_len) = detect_header_marker(&mut file)?;
        let mut header = vec![0u8; header_len as usize];
        file.read_exact(&mut header)?;
        let trailer = read_marker(&mut file, endian, marker_size)?;
        if trailer != header_len {
            return Err(unsupported(&path, "header record length mismatch"));
        }
        let control = parse_control(&header, endian)
            .ok_or_else(|| unsupported(&path, "missing CORD signature"))?;
        if control.fixed_atoms != 0 {
            return Err(unsupported(&path, "fixed-atom frames are not supported"));
        }
        if control.four_dims {
            return Err(unsupported(&path, "four-dimensional frames are not supported"));
        }

        let title_len = read_marker(&mut file, endian, marker_size)?;
        file.seek_relative(title_len as i64)?;
        if read_marker(&mut file, endian, marker_size)? != title_len {
            return Err(unsupported(&path, "title record length mismatch"));
        }

        if read_marker(&mut file, endian, marker_size)? != 4 {
            return Err(unsupported(&path, "unexpected atom count record length"));
        }
        let mut raw = [0u8; 4];
        file.read_exact(&mut raw)?;
        let natoms = endian.i32(raw);
        if read_marker(&mut file, endian, marker_size)? != 4 {
            return Err(unsupported(&path, "atom count record length mismatch"));
        }
        if natoms <= 0 {
            return Err(unsupported(&path, &format!("invalid atom count {natoms}")));
        }
        let n_atoms = natoms as usize;
        let data_start = file.stream_position()?;

        let cell_len = if control.has_cell && file_len > data_start {
            let len = read_marker(&mut file, endian, marker_size)?;
            file.seek(SeekFrom::Start(data_start))?;
            if !matches!(len, 24 | 48) {
                return Err(unsupported(&path, &format!("unit cell record of {len} bytes")));
            }
            Some(len)
        } else if control.has_cell {
            Some(48)
        } else {
            None
        };

        let coord_record = 2 * marker_size + 4 * n_atoms as u64;
        let cell_record = cell_len.map_or(0, |len| 2 * marker_size + len);
        let stride = 3 * coord_record + cell_record;
        let payload = file_len - data_start;
        if payload % stride != 0 {
            return Err(unsupported(
                &path,
                &format!("{} trailing bytes after the last whole frame", payload % stride),
            ));
        }
        let n_frames = (payload / stride) as usize;
        if control.n_frames != n_frames as i32 {
            warn!(
                path = %path.display(),
                header_frames = control.n_frames,
                file_frames = n_frames,
                "DCD header frame count disagrees with file size; using file size"
            );
        }

        let layout = if control.charmm_version > 0 {
            CellLayout::Charmm
        } else {
            CellLayout::Standard
        };
        debug!(
            path = %path.display(),
            n_atoms,
            n_frames,
            has_cell = cell_len.is_some(),
            big_endian = endian == Endian::Big,
            marker_size,
            "opened DCD file"
        );

        Ok(Self {
            path,
            file,
            endian,
            marker_size,
            n_atoms,
            n_frames,
            cell_len,
            layout,
            data_start,
            stride,
            next_frame: Some(0),
            axis_buf: Vec::with_capacity(n_atoms * 4),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn read_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()> {
        if out.atom_count() != self.n_atoms {
            return Err(TrajError::Decode {
                index,
                reason: format!(
                    "output buffer holds {} atoms, file has {}",
                    out.atom_count(),
                    self.n_atoms
                ),
            });
        }
        let box_ = match self.cell_len {
            Some(len) => box_from_cell(self.read_cell(index, len)?, self.layout),
            None => None,
        };
        out.set_box(box_);

        let endian = self.endian;
        for axis in 0..3 {
            self.read_axis(index)?;
            let coords = out.coordinates_mut();
            for (row, chunk) in coords.iter_mut().zip(self.axis_buf.chunks_exact(4)) {
                row[axis] = endian.f32([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64;
            }
        }
        Ok(())
    }

    fn read_cell(&mut self, index: usize, len: u64) -> TrajResult<[f64; 6]> {
        self.expect_marker(index, "unit cell", len)?;
        let mut values = [0.0f64; 6];
        for value in values.iter_mut() {
            *value = if len == 48 {
                let mut raw = [0u8; 8];
                self.file.read_exact(&mut raw)?;
                self.endian.f64(raw)
            } else {
                let mut raw = [0u8; 4];
                self.file.read_exact(&mut raw)?;
                self.endian.f32(raw) as f64
            };
        }
        self.expect_marker(index, "unit cell", len)?;
        Ok(values)
    }

    fn read_axis(&mut self, index: usize) -> TrajResult<()> {
        let len = 4 * self.n_atoms as u64;
        self.expect_marker(index, "coordinate", len)?;
        self.axis_buf.resize(self.n_atoms * 4, 0);
        self.file.read_exact(&mut self.axis_buf)?;
        self.expect_marker(index, "coordinate", len)
    }

    fn expect_marker(&mut self, index: usize, what: &str, expected: u64) -> TrajResult<()> {
        let found = read_marker(&mut self.file, self.endian, self.marker_size)?;
        if found != expected {
            return Err(TrajError::Decode {
                index,
                reason: format!("{what} record marker is {found}, expected {expected}"),
            });
        }
        Ok(())
    }
}

impl FrameDecoder for DcdDecoder {
    fn header(&self) -> DecoderHeader {
        DecoderHeader {
            frame_count: Some(self.n_frames),
            atom_count: self.n_atoms,
            has_box: self.cell_len.is_some(),
        }
    }

    fn decode_frame(&mut self, index: usize, out: &mut Frame) -> TrajResult<()> {
        if index >= self.n_frames {
            return Err(TrajError::index("frame", index, self.n_frames));
        }
        if self.next_frame != Some(index) {
            let offset = self.data_start + index as u64 * self.stride;
            self.file.seek(SeekFrom::Start(offset))?;
        }
        self.next_frame = None;
        self.read_frame(index, out)?;
        self.next_frame = Some(index + 1);
        Ok(())
    }
}

fn unsupported(path: &Path, reason: &str) -> TrajError {
    TrajError::UnsupportedFormat(format!("{}: {reason}", path.display()))
}

fn is_header_len(len: u64) -> bool {
    matches!(len, 84 | 164)
}

/// Works out byte order and marker width from the leading header record marker.
fn detect_header_marker(file: &mut (impl Read + Seek)) -> TrajResult<(Endian, u64, u64)> {
    let mut wide = [0u8; 8];
    file.read_exact(&mut wide)?;
    if is_header_len(u64::from_le_bytes(wide)) {
        return Ok((Endian::Little, 8, u64::from_le_bytes(wide)));
    }
    if is_header_len(u64::from_be_bytes(wide)) {
        return Ok((Endian::Big, 8, u64::from_be_bytes(wide)));
    }
    file.seek(SeekFrom::Start(4))?;
    let narrow = [wide[0], wide[1], wide[2], wide[3]];
    let le = u32::from_le_bytes(narrow) as u64;
    let be = u32::from_be_bytes(narrow) as u64;
    if is_header_len(le) {
        Ok((Endian::Little, 4, le))
    } else if is_header_len(be) {
        Ok((Endian::Big, 4, be))
    } else {
        Err(TrajError::UnsupportedFormat(
            "not a DCD file: unrecognized leading record marker".into(),
        ))
    }
}

fn read_marker(file: &mut impl Read, endian: Endian, marker_size: u64) -> TrajResult<u64> {
    if marker_size == 8 {
        let mut raw = [0u8; 8];
        file.read_exact(&mut raw)?;
        return Ok(match endian {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        });
    }
    let mut raw = [0u8; 4];
    file.read_exact(&mut raw)?;
    Ok(match endian {
        Endian::Little => u32::from_le_bytes(raw),
        Endian::Big => u32::from_be_bytes(raw),
    } as u64)
}

fn parse_control(header: &[u8], endian: Endian) -> Option<Control> {
    if header.len() < 4 + 4 * CONTROL_WORDS || &header[0..4] != b"CORD" {
        return None;
    }
    let mut icntrl = [0i32; CONTROL_WORDS];
    for (i, word) in icntrl.iter_mut().enumerate() {
        let at = 4 + 4 * i;
        *word = endian.i32([header[at], header[at + 1], header[at + 2], header[at + 3]]);
    }
    Some(Control {
        n_frames: icntrl[0],
        fixed_atoms: icntrl[8],
        has_cell: icntrl[10] != 0,
        four_dims: icntrl[11] != 0,
        charmm_version: icntrl[19],
    })
}

fn box_from_cell(values: [f64; 6], layout: CellLayout) -> Option<Box3> {
    let (lengths, angles) = match layout {
        CellLayout::Standard => (
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
        ),
        CellLayout::Charmm => (
            [values[0], values[2], values[5]],
            [values[4], values[3], values[1]],
        ),
    };
    if lengths.iter().any(|l| !l.is_finite() || *l <= 1e-6) {
        return None;
    }
    let angles = angles.map(cell_angle_degrees);
    if angles.iter().any(|a| !a.is_finite()) {
        return None;
    }
    Some(Box3::new(lengths, angles))
}

/// Newer writers store cosines instead of degrees.
fn cell_angle_degrees(value: f64) -> f64 {
    if value.abs() <= 1.0 {
        value.acos().to_degrees()
    } else {
        value
    }
}
