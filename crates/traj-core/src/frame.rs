use std::ops::{Bound, Range, RangeBounds};

use serde::{Deserialize, Serialize};

use crate::error::{TrajError, TrajResult};

/// Unit cell as three edge lengths and three angles (degrees), in the
/// `[a, b, c, alpha, beta, gamma]` order most MD formats use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box3 {
    pub lengths: [f64; 3],
    pub angles: [f64; 3],
}

const ANGLE_EPS: f64 = 1.0e-6;

impl Box3 {
    pub fn new(lengths: [f64; 3], angles: [f64; 3]) -> Self {
        Self { lengths, angles }
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> Self {
        Self::new([lx, ly, lz], [90.0, 90.0, 90.0])
    }

    pub fn from_array(values: [f64; 6]) -> Self {
        Self::new(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
        )
    }

    pub fn to_array(&self) -> [f64; 6] {
        let [a, b, c] = self.lengths;
        let [alpha, beta, gamma] = self.angles;
        [a, b, c, alpha, beta, gamma]
    }

    pub fn is_orthorhombic(&self) -> bool {
        self.angles.iter().all(|&a| (a - 90.0).abs() < ANGLE_EPS)
    }

    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.lengths;
        if self.is_orthorhombic() {
            return a * b * c;
        }
        let [ca, cb, cg] = self.angles.map(|deg| deg.to_radians().cos());
        let factor = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        a * b * c * factor.max(0.0).sqrt()
    }
}

/// Turns any `RangeBounds` into a concrete half-open range checked against `len`.
pub fn resolve_range(
    range: impl RangeBounds<usize>,
    len: usize,
    what: &'static str,
) -> TrajResult<Range<usize>> {
    let past = |bound: usize| {
        bound
            .checked_add(1)
            .ok_or_else(|| TrajError::index(what, usize::MAX, len))
    };
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => past(s)?,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => past(e)?,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    if end > len {
        return Err(TrajError::index(what, end - 1, len));
    }
    if start > end {
        return Err(TrajError::index(what, start, len));
    }
    Ok(start..end)
}

fn check_row(index: usize, len: usize) -> TrajResult<()> {
    if index >= len {
        return Err(TrajError::index("atom", index, len));
    }
    Ok(())
}

/// One snapshot with exclusively owned storage.
///
/// The atom count is fixed at construction; `reset` is the only way to
/// change it and is meant for decoders that reuse one buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    coords: Vec<[f64; 3]>,
    box_: Option<Box3>,
    temperature: Option<f64>,
    time_ps: Option<f64>,
}

impl Frame {
    pub fn new(coords: Vec<[f64; 3]>) -> Self {
        Self {
            coords,
            ..Self::default()
        }
    }

    pub fn zeros(n_atoms: usize) -> Self {
        Self::new(vec![[0.0; 3]; n_atoms])
    }

    pub fn with_box(mut self, box_: Option<Box3>) -> Self {
        self.box_ = box_;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_time(mut self, time_ps: Option<f64>) -> Self {
        self.time_ps = time_ps;
        self
    }

    /// Resizes the coordinate buffer and clears metadata, keeping the allocation.
    pub fn reset(&mut self, n_atoms: usize) {
        self.coords.clear();
        self.coords.resize(n_atoms, [0.0; 3]);
        self.box_ = None;
        self.temperature = None;
        self.time_ps = None;
    }

    pub fn atom_count(&self) -> usize {
        self.coords.len()
    }

    pub fn coordinates(&self) -> &[[f64; 3]] {
        &self.coords
    }

    pub fn coordinates_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.coords
    }

    pub fn coordinates_view(&self, range: impl RangeBounds<usize>) -> TrajResult<&[[f64; 3]]> {
        let range = resolve_range(range, self.coords.len(), "atom")?;
        Ok(&self.coords[range])
    }

    pub fn box_(&self) -> Option<Box3> {
        self.box_
    }

    pub fn set_box(&mut self, box_: Option<Box3>) {
        self.box_ = box_;
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: Option<f64>) {
        self.temperature = temperature;
    }

    pub fn time_ps(&self) -> Option<f64> {
        self.time_ps
    }

    pub fn set_time(&mut self, time_ps: Option<f64>) {
        self.time_ps = time_ps;
    }

    pub fn set_row(&mut self, index: usize, xyz: [f64; 3]) -> TrajResult<()> {
        check_row(index, self.coords.len())?;
        self.coords[index] = xyz;
        Ok(())
    }

    /// Deep copy with independent ownership.
    pub fn copy(&self) -> Frame {
        self.clone()
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            coords: &self.coords,
            box_: self.box_,
            temperature: self.temperature,
            time_ps: self.time_ps,
        }
    }

    pub fn view_mut(&mut self) -> FrameViewMut<'_> {
        FrameViewMut {
            coords: &mut self.coords,
            box_: &mut self.box_,
            temperature: &mut self.temperature,
            time_ps: &mut self.time_ps,
        }
    }
}

/// Read-only, non-owning window onto a frame held elsewhere (a
/// `Trajectory` slot, a `Frame`, or a decoder buffer).
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    coords: &'a [[f64; 3]],
    box_: Option<Box3>,
    temperature: Option<f64>,
    time_ps: Option<f64>,
}

impl<'a> FrameView<'a> {
    pub fn new(
        coords: &'a [[f64; 3]],
        box_: Option<Box3>,
        temperature: Option<f64>,
        time_ps: Option<f64>,
    ) -> Self {
        Self {
            coords,
            box_,
            temperature,
            time_ps,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.coords.len()
    }

    pub fn coordinates(&self) -> &'a [[f64; 3]] {
        self.coords
    }

    pub fn coordinates_view(&self, range: impl RangeBounds<usize>) -> TrajResult<&'a [[f64; 3]]> {
        let coords = self.coords;
        let range = resolve_range(range, coords.len(), "atom")?;
        Ok(&coords[range])
    }

    pub fn atom(&self, index: usize) -> TrajResult<[f64; 3]> {
        check_row(index, self.coords.len())?;
        Ok(self.coords[index])
    }

    pub fn box_(&self) -> Option<Box3> {
        self.box_
    }

    pub fn has_box(&self) -> bool {
        self.box_.is_some()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn time_ps(&self) -> Option<f64> {
        self.time_ps
    }

    /// Copies the viewed data out into an owned frame.
    pub fn to_frame(&self) -> Frame {
        Frame {
            coords: self.coords.to_vec(),
            box_: self.box_,
            temperature: self.temperature,
            time_ps: self.time_ps,
        }
    }
}

/// Exclusive, non-owning window onto a frame.
///
/// Writes go straight into the backing storage: after
/// `traj.frame_mut(2)?.set_row(0, [1.0, 2.0, 3.0])`, `traj.frame(2)` sees
/// the new row. Nothing is copied on write.
#[derive(Debug)]
pub struct FrameViewMut<'a> {
    coords: &'a mut [[f64; 3]],
    box_: &'a mut Option<Box3>,
    temperature: &'a mut Option<f64>,
    time_ps: &'a mut Option<f64>,
}

impl<'a> FrameViewMut<'a> {
    pub fn new(
        coords: &'a mut [[f64; 3]],
        box_: &'a mut Option<Box3>,
        temperature: &'a mut Option<f64>,
        time_ps: &'a mut Option<f64>,
    ) -> Self {
        Self {
            coords,
            box_,
            temperature,
            time_ps,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.coords.len()
    }

    pub fn coordinates(&self) -> &[[f64; 3]] {
        &*self.coords
    }

    pub fn coordinates_mut(&mut self) -> &mut [[f64; 3]] {
        &mut *self.coords
    }

    pub fn coordinates_view_mut(
        &mut self,
        range: impl RangeBounds<usize>,
    ) -> TrajResult<&mut [[f64; 3]]> {
        let range = resolve_range(range, self.coords.len(), "atom")?;
        Ok(&mut self.coords[range])
    }

    pub fn set_row(&mut self, index: usize, xyz: [f64; 3]) -> TrajResult<()> {
        check_row(index, self.coords.len())?;
        self.coords[index] = xyz;
        Ok(())
    }

    pub fn box_(&self) -> Option<Box3> {
        *self.box_
    }

    pub fn set_box(&mut self, box_: Option<Box3>) {
        *self.box_ = box_;
    }

    pub fn set_temperature(&mut self, temperature: Option<f64>) {
        *self.temperature = temperature;
    }

    pub fn set_time(&mut self, time_ps: Option<f64>) {
        *self.time_ps = time_ps;
    }

    pub fn as_view(&self) -> FrameView<'_> {
        FrameView::new(&*self.coords, *self.box_, *self.temperature, *self.time_ps)
    }

    pub fn to_frame(&self) -> Frame {
        self.as_view().to_frame()
    }
}
